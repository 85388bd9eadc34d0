//! Task file parsing and loading
//!
//! This module handles the task file schema, conversion into runtime
//! types, include resolution, and task file discovery.

pub mod loader;
pub mod types;

// Re-export main types
pub use loader::{find_taskfile, load_file, load_str, TASKFILE_NAMES};
pub use types::{
    assignment_from_yaml, value_from_yaml, vars_from_mapping, ActionConfig, ActionDetail,
    TaskConfig, TaskfileDoc,
};
