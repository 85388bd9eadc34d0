//! Taskrun - a simple declarative task runner
//!
//! Taskrun loads a YAML task file that registers named tasks, resolves
//! variables through scoped `$(name)` substitution, and runs tasks on
//! demand, honoring flat dependency lists and run-once semantics. A
//! lightweight alternative to a Makefile.

// Public modules
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod runner;

// Re-export commonly used types
pub use error::{Result, ScriptError, TaskrunError};

/// Current version of Taskrun
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
