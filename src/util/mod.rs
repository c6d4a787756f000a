//! Utility modules

pub mod names;
pub mod paths;

pub use names::generate_repo_name;
pub use paths::{absolute_path, remove_dir_if_exists};
