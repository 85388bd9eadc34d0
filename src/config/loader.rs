//! Task file loading and discovery
//!
//! Loads a task file document: applies its variable assignments, resolves
//! `include:` globs relative to the file, and registers its tasks.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::types::{assignment_from_yaml, TaskConfig, TaskfileDoc};
use crate::env::{Environment, VerboseTopic};
use crate::error::{Result, TaskrunError};
use crate::runner::Registry;

/// Default task file names, tried in order.
pub const TASKFILE_NAMES: &[&str] = &["taskrun.yml", "taskrun.yaml"];

/// Find a task file starting from a directory, optionally walking up the
/// directory tree.
pub fn find_taskfile(start_dir: &Path, names: &[&str], walk: bool) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        for name in names {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if !walk {
            return None;
        }
        match dir.parent() {
            Some(parent) if parent != dir => dir = parent.to_path_buf(),
            _ => return None,
        }
    }
}

/// Load a task file. Any error is annotated with the file path; nested
/// includes produce a chain of annotations back to the original file.
pub fn load_file(path: &Path, env: &mut Environment, registry: &mut Registry) -> Result<()> {
    load_file_inner(path, env, registry).map_err(|e| TaskrunError::in_file(path, e))
}

fn load_file_inner(path: &Path, env: &mut Environment, registry: &mut Registry) -> Result<()> {
    if env.is_verbose(VerboseTopic::Load) {
        env.error(&format!("Entering {}", path.display()));
    }

    let text = fs::read_to_string(path)?;
    load_str(&text, path, env, registry)?;

    if env.is_verbose(VerboseTopic::Load) {
        env.error(&format!("Leaving {}", path.display()));
    }
    Ok(())
}

/// Load a task file document from a string. `origin` names the file the
/// text came from; its directory anchors include patterns.
pub fn load_str(
    text: &str,
    origin: &Path,
    env: &mut Environment,
    registry: &mut Registry,
) -> Result<()> {
    let doc: TaskfileDoc = serde_yaml::from_str(text)?;

    for (key, value) in &doc.vars {
        let name = key.as_str().ok_or_else(|| {
            TaskrunError::Invalid("variable names must be strings".to_string())
        })?;
        env.set(name, assignment_from_yaml(value)?);
    }

    let base_dir = origin.parent().unwrap_or_else(|| Path::new("."));
    for pattern in &doc.include {
        let pattern = env.subst_str(pattern, None)?;
        for entry in expand_glob(&base_dir.join(&pattern))? {
            // Each included file loads inside its own scope: variable
            // changes stay isolated, task registrations persist.
            env.scoped(|env| load_file(&entry, env, registry))?;
        }
    }

    for (key, value) in &doc.tasks {
        let name = key.as_str().ok_or_else(|| {
            TaskrunError::Invalid("task names must be strings".to_string())
        })?;
        let config: TaskConfig = serde_yaml::from_value(value.clone())?;
        let extend = config.extend;
        registry.register(name, config.into_def()?, extend)?;
    }

    Ok(())
}

/// Expand a glob pattern to a sorted list of matches.
fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern = pattern.to_string_lossy();
    let paths =
        glob::glob(&pattern).map_err(|e| TaskrunError::InvalidPattern(e.to_string()))?;

    let mut matches = Vec::new();
    for entry in paths {
        matches.push(entry.map_err(|e| TaskrunError::Io(e.into_error()))?);
    }
    matches.sort();
    Ok(matches)
}
