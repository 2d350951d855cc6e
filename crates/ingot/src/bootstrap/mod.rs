//! Bootstrap unit generation
//!
//! The bootstrap unit is the one compilation unit this system synthesizes
//! itself: at artifact-load time it invokes every patched entry point, builds
//! the in-memory module registry, installs the finder/loader pair into the
//! host's resolution order, and promotes the root module to be the artifact's
//! own identity. Its generated header and source are overwritten wholesale on
//! each dirty rebuild and left untouched otherwise.

mod ir;

pub use ir::{BootstrapStmt, BootstrapUnit, FINDER_CLASS, InitializerDecl, LOADER_CLASS};

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    build_set::BuildSet,
    module_def::ModuleDef,
    staleness,
    translator::{self, TranslateOptions},
};

/// Locations of the bootstrap unit's generated files.
#[derive(Debug, Clone)]
pub struct BootstrapPaths {
    stem: PathBuf,
}

impl BootstrapPaths {
    pub fn new(working_path: &Path) -> Self {
        Self {
            stem: working_path.join("bootstrap"),
        }
    }

    pub fn header_path(&self) -> PathBuf {
        self.stem.with_extension("h")
    }

    pub fn pyx_path(&self) -> PathBuf {
        self.stem.with_extension("pyx")
    }

    pub fn c_path(&self) -> PathBuf {
        self.stem.with_extension("c")
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.stem.with_extension("html")
    }
}

/// Generate (or keep) the bootstrap unit for a fully translated and patched
/// build set.
///
/// Returns the bootstrap's descriptor and whether anything was regenerated.
/// The descriptor keeps the host-visible `PyInit_<package>` entry point: the
/// bootstrap is the artifact's real extension module, so it is the one unit
/// whose symbol must stay exported.
pub fn generate_bootstrap(
    set: &BuildSet,
    paths: &BootstrapPaths,
    options: &TranslateOptions,
    check_timestamps: bool,
    modules_dirty: bool,
) -> Result<(ModuleDef, bool)> {
    let package_name = set.package_name();
    let bootstrap_def = ModuleDef::new_with_symbol(
        package_name,
        true,
        paths.c_path(),
        format!("PyInit_{package_name}"),
    );

    // The bootstrap's content depends on every module's identity, so its
    // staleness is judged against the whole set, not any single module.
    let mut outputs = vec![paths.header_path(), paths.pyx_path(), paths.c_path()];
    if options.annotate_html {
        outputs.push(paths.annotation_path());
    }
    let output_refs: Vec<&Path> = outputs.iter().map(PathBuf::as_path).collect();
    let dirty = modules_dirty || staleness::outputs_are_stale(&output_refs, set, check_timestamps);
    if !dirty {
        debug!("bootstrap unit is up to date");
        return Ok((bootstrap_def, false));
    }

    let unit = BootstrapUnit::from_build_set(set);
    if let Some(parent) = paths.pyx_path().parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(paths.header_path(), unit.render_header())
        .with_context(|| format!("writing {}", paths.header_path().display()))?;
    fs::write(paths.pyx_path(), unit.render_pyx())
        .with_context(|| format!("writing {}", paths.pyx_path().display()))?;
    info!(
        "generated bootstrap for {} module(s) of '{package_name}'",
        set.len()
    );

    translator::translate_file(&paths.pyx_path(), package_name, &paths.c_path(), options)?;
    Ok((bootstrap_def, true))
}
