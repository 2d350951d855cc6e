//! Ordered set of module descriptors for one package build
//!
//! The build set is the single source of truth for module identity throughout
//! the pipeline. Construction validates the invariants every later stage
//! relies on: no duplicate `(is_package, qualified_name)` pairs, pairwise
//! distinct initializer symbols, at least one populated source slot per
//! descriptor, and exactly one root descriptor — the module whose qualified
//! name equals the package's final installed name.

use crate::{
    error::{BuildError, BuildResult},
    module_def::ModuleDef,
    types::FxIndexSet,
};

/// All descriptors for one package build, plus the root's position.
#[derive(Debug, Clone)]
pub struct BuildSet {
    package_name: String,
    modules: Vec<ModuleDef>,
    root: usize,
}

impl BuildSet {
    /// Validate `modules` and locate the root descriptor.
    ///
    /// Rejects duplicate identities before any translation work happens;
    /// a preprocessor pipeline that produced a set without the root module
    /// is a contract violation, not a recoverable state.
    pub fn new(package_name: impl Into<String>, modules: Vec<ModuleDef>) -> BuildResult<Self> {
        let package_name = package_name.into();

        let mut identities: FxIndexSet<(bool, &str)> = FxIndexSet::default();
        let mut symbols: FxIndexSet<&str> = FxIndexSet::default();
        for module in &modules {
            if !identities.insert((module.is_package, module.qualified_name.as_str())) {
                return Err(BuildError::config(format!(
                    "duplicate module '{}' in build set",
                    module.qualified_name
                )));
            }
            if !symbols.insert(module.initializer_symbol.as_str()) {
                return Err(BuildError::config(format!(
                    "initializer symbol '{}' assigned twice",
                    module.initializer_symbol
                )));
            }
            if !module.has_sources() {
                return Err(BuildError::config(format!(
                    "module '{}' has no source representation",
                    module.qualified_name
                )));
            }
        }

        let root = modules
            .iter()
            .position(|module| module.qualified_name == package_name)
            .ok_or_else(|| {
                BuildError::config(format!(
                    "build set does not contain the root module '{package_name}'"
                ))
            })?;

        Ok(Self {
            package_name,
            modules,
            root,
        })
    }

    /// The package's final installed name.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// All descriptors, in discovery order.
    pub fn modules(&self) -> &[ModuleDef] {
        &self.modules
    }

    /// Index of the root descriptor.
    pub fn root_index(&self) -> usize {
        self.root
    }

    /// The root descriptor itself.
    pub fn root(&self) -> &ModuleDef {
        &self.modules[self.root]
    }

    /// Number of descriptors in the set.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the set holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Rebuild the set with a replacement descriptor list, re-validating all
    /// invariants and re-locating the root. Descriptor identity is by
    /// qualified name, never by reference — rewriters are free to return
    /// entirely new descriptors.
    pub fn with_modules(self, modules: Vec<ModuleDef>) -> BuildResult<Self> {
        Self::new(self.package_name, modules)
    }
}
