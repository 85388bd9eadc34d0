//! Error types for Taskrun

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Taskrun operations
pub type Result<T> = std::result::Result<T, TaskrunError>;

/// Main error type for Taskrun
#[derive(Error, Debug)]
pub enum TaskrunError {
    /// Errors raised by task files and task execution
    #[error("{0}")]
    Script(#[from] ScriptError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Structurally valid YAML that is not a valid task file
    #[error("Invalid task file: {0}")]
    Invalid(String),

    /// Bad include or list glob pattern
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// No task file found during discovery
    #[error("Unable to find {0}")]
    TaskfileNotFound(String),

    /// An error annotated with the file it originated from. Nested
    /// annotations form the include origin trace.
    #[error("{}: {}", path.display(), source)]
    InFile {
        path: PathBuf,
        source: Box<TaskrunError>,
    },
}

/// Task-file and execution errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Variable not set: {0}")]
    VariableNotFound(String),

    #[error("No such filter: {0}")]
    FilterNotFound(String),

    #[error("Filter already defined: {0}")]
    DuplicateFilter(String),

    #[error("Task already defined: {0}")]
    DuplicateTask(String),

    #[error("No such task: {0}")]
    UnknownTask(String),

    #[error("Setting reserved variable '{0}' from the command line is not allowed")]
    ReservedName(String),

    #[error("Failed to launch shell '{shell}': {source}")]
    ShellLaunch { shell: String, source: io::Error },

    #[error("Command exited with unexpected code {code}: {command}")]
    Command { command: String, code: i32 },
}

/// Specialized result type for environment and execution operations
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

impl TaskrunError {
    /// Wrap an error with the path of the file being loaded.
    pub fn in_file(path: impl Into<PathBuf>, source: TaskrunError) -> TaskrunError {
        TaskrunError::InFile {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// The chain of file paths this error passed through while loading,
    /// outermost first. Empty for errors raised outside of loading.
    pub fn origin_trace(&self) -> Vec<&std::path::Path> {
        let mut trace = Vec::new();
        let mut cur = self;
        while let TaskrunError::InFile { path, source } = cur {
            trace.push(path.as_path());
            cur = source;
        }
        trace
    }
}
