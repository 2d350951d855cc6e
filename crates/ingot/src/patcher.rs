//! Entry-point symbol patching
//!
//! The translator derives each unit's exported entry point from the leaf
//! filename stem alone (`PyInit_<stem>`), so independently translated units
//! collide as soon as two modules share a stem — every package index does.
//! The patcher rewrites each freshly translated unit to use the descriptor's
//! globally unique initializer symbol, and demotes the translator's
//! "directly-executed unit" marker from `extern` to `static` so its symbol
//! never reaches the linker: at most one unit may claim that role and this
//! build never wants any unit to claim it automatically.
//!
//! Patching is a pure text function; the on-disk unit is rewritten only when
//! content actually changed, so re-running on an already-patched file is a
//! no-op.

use std::{borrow::Cow, fs};

use anyhow::{Context, Result};
use cow_utils::CowUtils;
use log::debug;

use crate::{
    error::{BuildError, BuildResult},
    module_def::ModuleDef,
};

/// Occurrences of the default entry-point name the translator emits: package
/// indexes carry one extra declared occurrence.
pub fn expected_occurrences(is_package: bool) -> usize {
    if is_package { 3 } else { 2 }
}

/// Rewrite one unit's text: every `PyInit_<stem>` becomes `initializer`, and
/// the `extern int __pyx_module_is_main_<stem>` marker becomes `static`.
///
/// Returns borrowed text unchanged when the unit is already patched. A
/// default-name occurrence count different from the translator contract is
/// fatal — it means the translator's output format no longer matches this
/// system's assumptions, and a silent partial rename would surface much later
/// as a duplicate- or unresolved-symbol link failure.
pub fn patch_unit_text<'a>(
    text: &'a str,
    stem: &str,
    initializer: &str,
    is_package: bool,
    module: &str,
) -> BuildResult<Cow<'a, str>> {
    let default_name = format!("PyInit_{stem}");
    let found = text.matches(&default_name).count();

    if found == 0 && text.contains(initializer) {
        // Already patched on a previous run.
        return Ok(Cow::Borrowed(text));
    }

    let expected = expected_occurrences(is_package);
    if found != expected {
        return Err(BuildError::SymbolContract {
            module: module.to_owned(),
            symbol: default_name,
            expected,
            found,
        });
    }

    let renamed = text
        .cow_replace(default_name.as_str(), initializer)
        .into_owned();
    let marker = format!("extern int __pyx_module_is_main_{stem}");
    let demoted = format!("static int __pyx_module_is_main_{stem}");
    Ok(Cow::Owned(renamed.cow_replace(marker.as_str(), &demoted).into_owned()))
}

/// Patch a descriptor's on-disk compilation unit in place.
///
/// Returns whether the file was rewritten.
pub fn patch_unit_file(def: &ModuleDef) -> Result<bool> {
    let text = fs::read_to_string(&def.c_path)
        .with_context(|| format!("reading compilation unit {}", def.c_path.display()))?;
    let patched = patch_unit_text(
        &text,
        &def.source_stem(),
        &def.initializer_symbol,
        def.is_package,
        &def.qualified_name,
    )?;

    match patched {
        Cow::Borrowed(_) => Ok(false),
        Cow::Owned(updated) => {
            fs::write(&def.c_path, updated)
                .with_context(|| format!("rewriting compilation unit {}", def.c_path.display()))?;
            debug!(
                "patched '{}' entry point to {}",
                def.qualified_name, def.initializer_symbol
            );
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// The shape of a translated leaf unit: a forward declaration and the
    /// definition, plus the directly-executed-unit marker pair.
    fn leaf_unit(stem: &str) -> String {
        format!(
            "extern int __pyx_module_is_main_{stem};\n\
             __Pyx_PyMODINIT_FUNC PyInit_{stem}(void);\n\
             __Pyx_PyMODINIT_FUNC PyInit_{stem}(void) {{\n  return 0;\n}}\n"
        )
    }

    /// Package indexes emit one extra declared occurrence.
    fn package_unit(stem: &str) -> String {
        format!(
            "extern int __pyx_module_is_main_{stem};\n\
             __Pyx_PyMODINIT_FUNC PyInit_{stem}(void);\n\
             static void *__pyx_export = (void *)PyInit_{stem};\n\
             __Pyx_PyMODINIT_FUNC PyInit_{stem}(void) {{\n  return 0;\n}}\n"
        )
    }

    #[test]
    fn renames_exactly_the_expected_leaf_occurrences() {
        let unit = leaf_unit("mod");
        let patched = patch_unit_text(&unit, "mod", "_deadbeef", false, "pkg.mod")
            .expect("contract holds");
        assert_eq!(patched.matches("_deadbeef").count(), 2);
        assert!(!patched.contains("PyInit_mod"));
    }

    #[test]
    fn renames_exactly_the_expected_package_occurrences() {
        let unit = package_unit("pkg");
        let patched = patch_unit_text(&unit, "pkg", "_cafe", true, "pkg")
            .expect("contract holds");
        assert_eq!(patched.matches("_cafe").count(), 3);
        assert!(!patched.contains("PyInit_pkg"));
    }

    #[test]
    fn demotes_the_main_unit_marker() {
        let unit = leaf_unit("mod");
        let patched = patch_unit_text(&unit, "mod", "_deadbeef", false, "pkg.mod")
            .expect("contract holds");
        assert!(patched.contains("static int __pyx_module_is_main_mod"));
        assert!(!patched.contains("extern int __pyx_module_is_main_mod"));
    }

    #[test]
    fn patching_is_idempotent() {
        let first = patch_unit_text(&leaf_unit("mod"), "mod", "_deadbeef", false, "pkg.mod")
            .expect("contract holds")
            .into_owned();
        let second = patch_unit_text(&first, "mod", "_deadbeef", false, "pkg.mod")
            .expect("already patched");
        assert!(matches!(second, Cow::Borrowed(_)));
        assert_eq!(second.as_ref(), first);
    }

    #[test]
    fn occurrence_count_mismatch_is_a_contract_violation() {
        // A leaf unit shaped like a package index: one occurrence too many.
        let err = patch_unit_text(&package_unit("mod"), "mod", "_deadbeef", false, "pkg.mod")
            .expect_err("count mismatch");
        match err {
            BuildError::SymbolContract {
                expected, found, ..
            } => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_entry_point_is_a_contract_violation() {
        let err = patch_unit_text("int x;\n", "mod", "_deadbeef", false, "pkg.mod")
            .expect_err("no entry point");
        assert!(matches!(err, BuildError::SymbolContract { found: 0, .. }));
    }

    #[test]
    fn file_rewrite_happens_only_on_change() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut def = ModuleDef::new("pkg.mod", false, dir.path().join("mod.c"));
        def.py_source = Some(String::new());
        fs::write(&def.c_path, leaf_unit("mod")).expect("write unit");

        assert!(patch_unit_file(&def).expect("first patch rewrites"));
        assert!(!patch_unit_file(&def).expect("second patch is a no-op"));
    }
}
