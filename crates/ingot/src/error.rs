//! Build error taxonomy.
//!
//! Every failure mode is build-breaking and surfaced to the invoker; there are
//! no automatic retries and no degraded fallback artifacts. The only soft
//! failure in the whole system is an unreadable timestamp, which is handled
//! locally by the staleness tracker (treated as "assume dirty") and never
//! reaches this type.

use std::fmt;

/// Unified error type for the bundling pipeline.
#[derive(Debug)]
pub enum BuildError {
    /// Invalid build configuration, reported before any subprocess work
    /// begins: ambiguous package roots, multiple roots declaring a package
    /// index, verbose and quiet both set, overlapping source edits.
    Config(String),
    /// The external translator failed. Carries the tool's diagnostic
    /// verbatim.
    Translation { module: String, detail: String },
    /// The translated unit did not contain the expected number of
    /// entry-point symbol occurrences. Signals a mismatch between this
    /// system's assumptions and the translator's output format.
    SymbolContract {
        module: String,
        symbol: String,
        expected: usize,
        found: usize,
    },
    /// The native toolchain failed to produce the shared artifact.
    Link(String),
}

/// Result alias for pipeline stages that fail with a [`BuildError`].
pub type BuildResult<T> = std::result::Result<T, BuildError>;

impl BuildError {
    /// Construct a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Construct a link error.
    pub fn link(message: impl Into<String>) -> Self {
        Self::Link(message.into())
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Config(message) => write!(f, "configuration error: {message}"),
            BuildError::Translation { module, detail } => {
                write!(f, "translation of module '{module}' failed: {detail}")
            }
            BuildError::SymbolContract {
                module,
                symbol,
                expected,
                found,
            } => write!(
                f,
                "compilation unit for '{module}' contains {found} occurrence(s) of '{symbol}', \
                 expected {expected}"
            ),
            BuildError::Link(message) => write!(f, "link failed: {message}"),
        }
    }
}

impl std::error::Error for BuildError {}
