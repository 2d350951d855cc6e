//! Shared type definitions for the ingot crate
//!
//! This module contains common types that are used across multiple components
//! of the bundler, ensuring consistency and avoiding circular dependencies.

use std::hash::BuildHasherDefault;

use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;

/// Type alias for FxHasher-based IndexMap
pub type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Type alias for FxHasher-based IndexSet
pub type FxIndexSet<T> = IndexSet<T, BuildHasherDefault<FxHasher>>;

/// The source representation a module was discovered through
///
/// A module may carry several representations at once (a `.pyx` with a
/// matching `.pxd` declaration file); this enum names one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Plain Python source (`.py`)
    Python,
    /// Pre-translated Cython source (`.pyx`)
    Cython,
    /// Cython declaration file (`.pxd`)
    CythonDeclarations,
}

impl SourceKind {
    /// All slots, in the priority order the pipeline dispatches on.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Python,
        SourceKind::Cython,
        SourceKind::CythonDeclarations,
    ];

    /// Map a file extension to a source kind, if it is one we collect.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "py" => Some(SourceKind::Python),
            "pyx" => Some(SourceKind::Cython),
            "pxd" => Some(SourceKind::CythonDeclarations),
            _ => None,
        }
    }

    /// The file extension for this slot, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            SourceKind::Python => "py",
            SourceKind::Cython => "pyx",
            SourceKind::CythonDeclarations => "pxd",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
