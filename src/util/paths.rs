//! Path utilities for fixture directories

use std::io;
use std::path::{Path, PathBuf};

/// Absolute form of `path` without requiring it to exist
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Recursively remove `dir`, treating "already gone" as success
pub async fn remove_dir_if_exists(dir: &Path) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
