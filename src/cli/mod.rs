//! CLI interface and argument parsing
//!
//! This module handles command-line parsing, task file discovery flags,
//! help and listing output, and shell completion.

pub mod app;

// Re-export main types
pub use app::{run, ABSTOP_VAR, CWD_VAR, TOP_VAR};
