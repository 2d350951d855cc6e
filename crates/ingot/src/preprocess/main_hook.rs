//! Entry-block promotion
//!
//! Bundled modules are never the interpreter's `__main__`, so their
//! `if __name__ == '__main__':` guards would be dead code. This rewriter
//! replaces the guard test of every such top-level conditional with a
//! zero-argument function-definition header bound to a fixed hook name,
//! turning the guarded block into an always-defined, separately callable
//! function. The installed loader's `get_code` invokes the hook when a
//! bundled module is executed with `python -m`.
//!
//! Guard detection is deliberately a single-line scanner, not a parser: a
//! top-level `if` whose test is an equality comparison between `__name__`
//! and the literal `"__main__"` (either operand order, either quote style)
//! on one line. Guards with multi-line tests are left alone.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::{
    module_def::ModuleDef,
    preprocess::{CodeRange, Preprocessor, SourceEditor},
};

/// Name of the synthetic module-level hook the guarded block becomes.
pub const MAIN_HOOK_NAME: &str = "__ingot_main__";

static MAIN_GUARD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^if\s+((?:__name__\s*==\s*(?:"__main__"|'__main__'))|(?:(?:"__main__"|'__main__')\s*==\s*__name__))\s*:"#,
    )
    .expect("main-guard pattern is valid")
});

/// Promotes every top-level main guard to a [`MAIN_HOOK_NAME`] definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct MainHookPreprocessor;

impl MainHookPreprocessor {
    fn promote(source: &str) -> Result<Option<String>> {
        let mut editor = SourceEditor::new();
        for (line_index, line) in source.lines().enumerate() {
            let Some(captures) = MAIN_GUARD.captures(line) else {
                continue;
            };
            let test = captures.get(1).expect("pattern has one capture group");
            // Replace `if <test>` only; the colon and the guarded block stay
            // byte-identical.
            editor.push(CodeRange::new(
                line_index,
                0,
                line_index,
                test.end(),
                format!("def {MAIN_HOOK_NAME}()"),
            )?);
        }

        if editor.is_empty() {
            return Ok(None);
        }
        Ok(Some(editor.apply(source)?))
    }
}

impl Preprocessor for MainHookPreprocessor {
    fn name(&self) -> &'static str {
        "main-hook"
    }

    fn process_py_module(&self, module: &ModuleDef) -> Result<Option<ModuleDef>> {
        let source = module.py_source.as_deref().expect("dispatched on py slot");
        Ok(Self::promote(source)?.map(|rewritten| {
            module
                .with_sources(Some(rewritten), None, None)
                .with_attribute("__main__", MAIN_HOOK_NAME)
        }))
    }

    fn process_pyx_module(&self, module: &ModuleDef) -> Result<Option<ModuleDef>> {
        let source = module.pyx_source.as_deref().expect("dispatched on pyx slot");
        Ok(Self::promote(source)?.map(|rewritten| {
            module
                .with_sources(None, Some(rewritten), None)
                .with_attribute("__main__", MAIN_HOOK_NAME)
        }))
    }
}
