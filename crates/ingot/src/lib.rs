//! ingot — compiles a Python package tree into a single self-contained
//! native extension module.
//!
//! One shared artifact instead of one extension per module: every module is
//! translated to a native compilation unit, its entry-point symbol is renamed
//! to a globally unique name, and a synthesized bootstrap unit registers all
//! modules with the host's import machinery at load time.

pub mod bootstrap;
pub mod build_set;
pub mod collector;
pub mod config;
pub mod error;
pub mod link;
pub mod module_def;
pub mod orchestrator;
pub mod patcher;
pub mod preprocess;
pub mod staleness;
pub mod translator;
pub mod types;
pub mod workers;
