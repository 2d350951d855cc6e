//! Source collection: package roots in, build set out
//!
//! Walks one or more package root directories, discovers module files by
//! extension, computes each module's dotted qualified name and package-ness,
//! and deduplicates modules reachable from multiple roots (namespace-package
//! union, first root wins). If the requested package name was not discovered
//! at all, an empty synthetic index module is added and becomes the root.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;

use crate::{
    build_set::BuildSet,
    error::BuildError,
    module_def::ModuleDef,
    types::{FxIndexSet, SourceKind},
};

/// Discover every module reachable from `package_paths` and assemble the
/// validated build set for `package_name`.
pub fn collect_package(
    package_name: &str,
    package_paths: &[PathBuf],
    working_path: &Path,
) -> Result<BuildSet> {
    if package_paths.is_empty() {
        return Err(BuildError::config("no package root paths were given").into());
    }

    // Namespace composition requires every root to omit its package index;
    // two roots both claiming `__init__.py` cannot be unified.
    if package_paths.len() > 1 {
        let indexed: Vec<&PathBuf> = package_paths
            .iter()
            .filter(|root| root.join("__init__.py").is_file())
            .collect();
        if !indexed.is_empty() {
            return Err(BuildError::config(format!(
                "namespace packages must omit '__init__.py' from every root; found one in {}",
                indexed[0].display()
            ))
            .into());
        }
    }

    let mut seen: FxIndexSet<(bool, String)> = FxIndexSet::default();
    let mut modules: Vec<ModuleDef> = Vec::new();

    for package_path in package_paths {
        let anchor = package_path.parent().unwrap_or_else(|| Path::new(""));
        let mut files = Vec::new();
        walk_sorted(package_path, &mut files)
            .with_context(|| format!("walking package root {}", package_path.display()))?;

        for module_path in files {
            let Some(kind) = module_path
                .extension()
                .and_then(|ext| ext.to_str())
                .and_then(SourceKind::from_extension)
            else {
                continue;
            };

            let relative = module_path
                .strip_prefix(anchor)
                .expect("walked path is under its root");
            let is_package =
                module_path.file_stem().and_then(|stem| stem.to_str()) == Some("__init__");
            let name_path = if is_package {
                relative.parent().unwrap_or_else(|| Path::new("")).to_path_buf()
            } else {
                relative.with_extension("")
            };
            let qualified_name = dotted_name(&name_path);
            if qualified_name.is_empty() {
                continue;
            }

            if !seen.insert((is_package, qualified_name.clone())) {
                // Already reachable from an earlier root (or as a sibling
                // representation of a file we discovered first).
                continue;
            }

            let c_path = working_path.join(relative).with_extension("c");
            let mut def = ModuleDef::new(qualified_name, is_package, c_path);
            load_sibling_sources(&module_path, &mut def)?;
            debug!(
                "collected {} ({}) as {} [{kind}]",
                def.qualified_name,
                if def.is_package { "package" } else { "module" },
                def.initializer_symbol
            );
            modules.push(def);
        }
    }

    if !modules
        .iter()
        .any(|module| module.qualified_name == package_name)
    {
        debug!("synthesizing empty root package '{package_name}'");
        let c_path = working_path.join(package_name).join("__init__.c");
        let mut root = ModuleDef::new(package_name, true, c_path);
        root.py_source = Some(String::new());
        modules.push(root);
    }

    Ok(BuildSet::new(package_name, modules)?)
}

/// Depth-first walk with lexicographically sorted entries, so discovery order
/// (and with it first-wins namespace union) is stable across filesystems.
fn walk_sorted(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            walk_sorted(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Join path components with dots.
fn dotted_name(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join(".")
}

/// Populate every source slot that has a sibling file next to the discovered
/// one: an `a.pyx` with an `a.pxd` yields both slots, regardless of which of
/// the two the walk saw first.
fn load_sibling_sources(module_path: &Path, def: &mut ModuleDef) -> Result<()> {
    for kind in SourceKind::ALL {
        let sibling = module_path.with_extension(kind.extension());
        if !sibling.is_file() {
            continue;
        }
        let text = fs::read_to_string(&sibling)
            .with_context(|| format!("reading source {}", sibling.display()))?;
        match kind {
            SourceKind::Python => def.py_source = Some(text),
            SourceKind::Cython => def.pyx_source = Some(text),
            SourceKind::CythonDeclarations => def.pxd_source = Some(text),
        }
    }
    Ok(())
}
