//! Git repository inspection helpers
//!
//! Read-only queries against repositories the fixture bootstraps.

use std::path::{Path, PathBuf};
use std::process::Command;

/// A repository created by the fixture, inspected from a test
pub struct RepoInspector {
    pub path: PathBuf,
}

impl RepoInspector {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn is_repo(&self) -> bool {
        self.path.join(".git").exists()
    }

    /// Number of commits reachable from HEAD
    pub fn commit_count(&self) -> usize {
        self.git_output(&["rev-list", "--count", "HEAD"])
            .trim()
            .parse()
            .expect("rev-list should print a number")
    }

    /// Files tracked at HEAD
    pub fn tracked_files(&self) -> Vec<String> {
        self.git_output(&["ls-tree", "--name-only", "HEAD"])
            .lines()
            .map(|s| s.to_string())
            .collect()
    }

    /// Check if the repository has uncommitted changes
    pub fn is_dirty(&self) -> bool {
        !self.git_output(&["status", "--porcelain"]).trim().is_empty()
    }

    /// Subject of the HEAD commit
    pub fn head_subject(&self) -> String {
        self.git_output(&["log", "-1", "--format=%s"]).trim().to_string()
    }

    /// Execute a git command and return output (for queries)
    pub fn git_output(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("Git command failed");

        if !output.status.success() {
            panic!(
                "Git command failed: git {}\nstderr: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        String::from_utf8_lossy(&output.stdout).to_string()
    }
}
