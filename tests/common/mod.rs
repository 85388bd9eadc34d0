//! Common test utilities

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a taskrun.yml file.
pub fn create_taskfile(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = write_taskfile(&temp_dir, content);
    (temp_dir, path)
}

/// Write a taskrun.yml into an existing temporary directory.
pub fn write_taskfile(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("taskrun.yml");
    fs::write(&path, content).unwrap();
    path
}
