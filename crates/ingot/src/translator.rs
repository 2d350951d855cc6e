//! External translator invocation
//!
//! The source-to-native translator is an external collaborator: the `cython`
//! executable, invoked as a subprocess once per dirty module. Its failure
//! diagnostic is propagated verbatim and is fatal — there are no retries and
//! no fallback.

use std::{
    path::Path,
    process::Command,
};

use log::debug;

use crate::{
    error::{BuildError, BuildResult},
    module_def::ModuleDef,
    types::SourceKind,
};

/// Flags forwarded to each translator invocation.
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    /// Major Python version the translator should assume; 2 or 3.
    pub language_level: u8,
    /// Emit html annotations showing residual Python interaction.
    pub annotate_html: bool,
    /// Include coverage information in annotations; implies `annotate_html`.
    pub annotate_coverage: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            language_level: 3,
            annotate_html: false,
            annotate_coverage: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl TranslateOptions {
    /// Validate the flag combination and normalize implications.
    ///
    /// Runs before any subprocess work: verbose and quiet are mutually
    /// exclusive, and coverage annotation implies html annotation.
    pub fn validated(mut self) -> BuildResult<Self> {
        if self.verbose && self.quiet {
            return Err(BuildError::config("verbose and quiet are mutually exclusive"));
        }
        if !matches!(self.language_level, 2 | 3) {
            return Err(BuildError::config(format!(
                "language level must be 2 or 3, got {}",
                self.language_level
            )));
        }
        if self.annotate_coverage {
            self.annotate_html = true;
        }
        Ok(self)
    }
}

/// The translator executable, overridable for pinned toolchains.
fn translator_command() -> Command {
    match std::env::var("INGOT_CYTHON") {
        Ok(translator) => Command::new(translator),
        Err(_) => Command::new("cython"),
    }
}

/// Translate one source file into a native compilation unit.
pub fn translate_file(
    input: &Path,
    module_name: &str,
    output: &Path,
    options: &TranslateOptions,
) -> BuildResult<()> {
    let mut cmd = translator_command();
    cmd.arg(format!("-{}", options.language_level))
        .arg(input)
        .arg("--module-name")
        .arg(module_name)
        .arg("-o")
        .arg(output);
    if options.annotate_html {
        cmd.arg("--annotate");
    }
    if options.annotate_coverage {
        cmd.arg("--annotate-coverage");
    }
    if options.verbose {
        cmd.arg("-v");
    }

    debug!("translating {} -> {}", input.display(), output.display());
    let output_state = cmd.output().map_err(|err| BuildError::Translation {
        module: module_name.to_owned(),
        detail: format!("failed to spawn translator: {err}"),
    })?;

    if !output_state.status.success() {
        return Err(BuildError::Translation {
            module: module_name.to_owned(),
            detail: String::from_utf8_lossy(&output_state.stderr).into_owned(),
        });
    }
    if options.verbose && !output_state.stderr.is_empty() {
        debug!(
            "translator output for {module_name}: {}",
            String::from_utf8_lossy(&output_state.stderr)
        );
    }
    Ok(())
}

/// Translate one module descriptor from its preferred source slot.
///
/// Cython convention: a `.pyx` takes precedence over a `.py` with the same
/// stem. A descriptor carrying only declarations has nothing to translate
/// into a module and fails the build.
pub fn translate_module(def: &ModuleDef, options: &TranslateOptions) -> BuildResult<()> {
    let kind = if def.pyx_source.is_some() {
        SourceKind::Cython
    } else if def.py_source.is_some() {
        SourceKind::Python
    } else {
        return Err(BuildError::Translation {
            module: def.qualified_name.clone(),
            detail: "module has only a declaration file and no translatable source".to_owned(),
        });
    };
    translate_file(
        &def.source_path(kind),
        &def.qualified_name,
        &def.c_path,
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_and_quiet_are_mutually_exclusive() {
        let err = TranslateOptions {
            verbose: true,
            quiet: true,
            ..TranslateOptions::default()
        }
        .validated()
        .expect_err("conflicting flags");
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn coverage_annotation_implies_html() {
        let options = TranslateOptions {
            annotate_coverage: true,
            ..TranslateOptions::default()
        }
        .validated()
        .expect("valid flags");
        assert!(options.annotate_html);
    }

    #[test]
    fn rejects_unknown_language_level() {
        let err = TranslateOptions {
            language_level: 4,
            ..TranslateOptions::default()
        }
        .validated()
        .expect_err("bad level");
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn declaration_only_modules_cannot_be_translated() {
        let mut def = ModuleDef::new(
            "pkg.decls",
            false,
            std::path::PathBuf::from("build/pkg/decls.c"),
        );
        def.pxd_source = Some(String::new());
        let err = translate_module(&def, &TranslateOptions::default())
            .expect_err("nothing to translate");
        assert!(matches!(err, BuildError::Translation { .. }));
    }
}
