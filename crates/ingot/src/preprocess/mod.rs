//! Preprocessor pipeline: ordered, pluggable source rewriters
//!
//! A rewriter is a pure function from build set to build set, applied strictly
//! in configured order before any translation happens. Rewriters may replace
//! descriptors' source slots and may introduce entirely new descriptors, but
//! must preserve each descriptor's qualified name and package-ness and must
//! never remove the root module — the pipeline re-validates the set after
//! every stage and fails the build if the contract was broken.

mod main_hook;
mod source_editor;

pub use main_hook::{MAIN_HOOK_NAME, MainHookPreprocessor};
pub use source_editor::{CodeRange, SourceEditor};

use anyhow::{Context, Result};
use log::debug;

use crate::{build_set::BuildSet, module_def::ModuleDef};

/// One stage of the rewrite pipeline.
///
/// The default `process_build_set` maps every descriptor through
/// `process_module`, which dispatches on the first populated source slot.
/// A stage that needs whole-set context (or wants to add descriptors)
/// overrides `process_build_set` directly.
pub trait Preprocessor {
    /// Stable name, used in logs and error context.
    fn name(&self) -> &'static str;

    /// Rewrite the whole set. Descriptor identity is by qualified name, not
    /// by reference; returning fresh descriptors is fine.
    fn process_build_set(&self, set: BuildSet) -> Result<BuildSet> {
        let mut modules = Vec::with_capacity(set.len());
        for module in set.modules() {
            match self.process_module(module)? {
                Some(rewritten) => modules.push(rewritten),
                None => modules.push(module.clone()),
            }
        }
        Ok(set.with_modules(modules)?)
    }

    /// Rewrite one descriptor, or return `None` to keep it unchanged.
    fn process_module(&self, module: &ModuleDef) -> Result<Option<ModuleDef>> {
        if module.py_source.is_some() {
            self.process_py_module(module)
        } else if module.pyx_source.is_some() {
            self.process_pyx_module(module)
        } else {
            self.process_pxd_module(module)
        }
    }

    /// Rewrite a module carrying plain Python source.
    fn process_py_module(&self, _module: &ModuleDef) -> Result<Option<ModuleDef>> {
        Ok(None)
    }

    /// Rewrite a module carrying Cython source.
    fn process_pyx_module(&self, _module: &ModuleDef) -> Result<Option<ModuleDef>> {
        Ok(None)
    }

    /// Rewrite a module carrying only declarations.
    fn process_pxd_module(&self, _module: &ModuleDef) -> Result<Option<ModuleDef>> {
        Ok(None)
    }
}

/// The stages applied when the caller does not configure any.
pub fn default_preprocessors() -> Vec<Box<dyn Preprocessor>> {
    vec![Box::new(MainHookPreprocessor)]
}

/// Run every stage in order, re-validating the set in between.
pub fn apply_preprocessors(
    mut set: BuildSet,
    preprocessors: &[Box<dyn Preprocessor>],
) -> Result<BuildSet> {
    for stage in preprocessors {
        debug!("running preprocessor '{}'", stage.name());
        set = stage
            .process_build_set(set)
            .with_context(|| format!("preprocessor '{}' failed", stage.name()))?;
    }
    Ok(set)
}
