//! Task execution engine
//!
//! This module handles task registration and invocation, structured task
//! bodies, and shell command execution.

pub mod action;
pub mod exec;
pub mod registry;

// Re-export main types
pub use action::{run_actions, Action};
pub use exec::{capture, run, CaptureMode, RunOptions, RunResult};
pub use registry::{Registry, TaskBody, TaskDef, TaskFn};
