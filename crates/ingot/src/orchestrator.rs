//! Build pipeline orchestration
//!
//! Drives one package build end to end: collect sources, run the rewrite
//! pipeline, persist the preprocessed sources, translate and patch every
//! dirty module, regenerate the bootstrap unit when anything changed, and
//! finally link the shared artifact. The pipeline itself is sequential; only
//! translator invocations fan out, and the link step is all-or-nothing once
//! any unit is dirty.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    bootstrap::{self, BootstrapPaths},
    build_set::BuildSet,
    collector,
    link::{self, LinkOptions},
    module_def::ModuleDef,
    patcher,
    preprocess::{self, Preprocessor},
    staleness,
    translator::{self, TranslateOptions},
    workers,
};

/// Everything one build invocation needs to know.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Final installed name of the package; the root module's qualified name.
    pub package_name: String,
    /// Package root directories. More than one forms a namespace union.
    pub package_paths: Vec<PathBuf>,
    /// Where generated sources, units, and the bootstrap land.
    pub working_path: PathBuf,
    pub translate: TranslateOptions,
    /// When false, timestamps are ignored and everything is rebuilt.
    pub check_timestamps: bool,
    /// Translator worker count; `0` auto-detects.
    pub jobs: usize,
    /// Link configuration, or `None` to stop after bootstrap generation.
    pub link: Option<LinkOptions>,
}

/// What a build produced.
#[derive(Debug)]
pub struct BuildOutcome {
    /// All module descriptors, post-preprocessing.
    pub modules: Vec<ModuleDef>,
    /// The synthesized bootstrap descriptor.
    pub bootstrap: ModuleDef,
    /// Compilation units handed to the linker, bootstrap first.
    pub unit_paths: Vec<PathBuf>,
    /// Whether anything was regenerated this run.
    pub dirty: bool,
    /// The linked artifact, when a link step ran or was already current.
    pub artifact: Option<PathBuf>,
}

/// Run one package build.
pub fn build_package(
    options: &BuildOptions,
    preprocessors: &[Box<dyn Preprocessor>],
) -> Result<BuildOutcome> {
    // Flag validation happens before any filesystem or subprocess work.
    let translate = options.translate.clone().validated()?;

    let set = collector::collect_package(
        &options.package_name,
        &options.package_paths,
        &options.working_path,
    )?;
    info!(
        "collected {} module(s) for package '{}'",
        set.len(),
        options.package_name
    );

    let set = preprocess::apply_preprocessors(set, preprocessors)?;

    for def in set.modules() {
        def.persist()
            .with_context(|| format!("persisting sources for '{}'", def.qualified_name))?;
    }

    let dirty_state = staleness::assess(&set, translate.annotate_html, options.check_timestamps);
    translate_and_patch(&set, &dirty_state, &translate, options.jobs)?;

    let paths = BootstrapPaths::new(&options.working_path);
    let (bootstrap_def, bootstrap_dirty) = bootstrap::generate_bootstrap(
        &set,
        &paths,
        &translate,
        options.check_timestamps,
        dirty_state.any_module_dirty,
    )?;

    let mut unit_paths = vec![bootstrap_def.c_path.clone()];
    unit_paths.extend(set.modules().iter().map(|def| def.c_path.clone()));

    let dirty = dirty_state.any_module_dirty || bootstrap_dirty;
    let artifact = match &options.link {
        Some(link_options) => {
            if dirty || !link_options.output.exists() {
                link::link_artifact(&unit_paths, link_options)?;
            } else {
                debug!("artifact {} is up to date", link_options.output.display());
            }
            Some(link_options.output.clone())
        }
        None => None,
    };

    Ok(BuildOutcome {
        modules: set.modules().to_vec(),
        bootstrap: bootstrap_def,
        unit_paths,
        dirty,
        artifact,
    })
}

/// Translate every dirty module and patch its unit, fanning out across the
/// worker pool. Patching chains onto each module's own translation; there is
/// no cross-module dependency. The first failure (in set order) aborts the
/// build after the pool drains.
fn translate_and_patch(
    set: &BuildSet,
    dirty_state: &staleness::DirtyState,
    translate: &TranslateOptions,
    jobs: usize,
) -> Result<()> {
    let dirty_modules: Vec<&ModuleDef> = set
        .modules()
        .iter()
        .zip(&dirty_state.per_module)
        .filter_map(|(def, dirty)| dirty.then_some(def))
        .collect();
    if dirty_modules.is_empty() {
        debug!("all {} module(s) are up to date", set.len());
        return Ok(());
    }

    let jobs = workers::effective_jobs(jobs);
    info!(
        "translating {} dirty module(s) across {jobs} worker(s)",
        dirty_modules.len()
    );
    let results = workers::run_parallel(&dirty_modules, jobs, |_, def| {
        translator::translate_module(def, translate)?;
        patcher::patch_unit_file(def)?;
        Ok::<(), anyhow::Error>(())
    });
    for result in results {
        result?;
    }
    Ok(())
}
