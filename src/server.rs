//! Proxy server command resolution
//!
//! A built server (`dist/index.js`) is run with `node`; otherwise the
//! TypeScript entry point is run through `ts-node`, preferring the copy in a
//! `node_modules/.bin` above the server package.

use std::path::{Path, PathBuf};

use crate::error::FixtureError;
use crate::util::absolute_path;

/// Program and arguments used to start the proxy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ServerCommand {
    /// Use an explicit `[program, args...]` command line
    pub fn from_parts(parts: &[String]) -> Result<Self, FixtureError> {
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| FixtureError::Config("server command is empty".to_string()))?;
        Ok(Self {
            program: PathBuf::from(program),
            args: args.to_vec(),
        })
    }

    /// Pick how to start the server package in `server_dir`
    pub fn resolve(server_dir: &Path) -> Result<Self, FixtureError> {
        let server_dir = absolute_path(server_dir)?;
        let dist_index = server_dir.join("dist").join("index.js");
        let ts_index = server_dir.join("src").join("index.ts");

        if dist_index.is_file() {
            let node = which::which("node").unwrap_or_else(|_| PathBuf::from("node"));
            return Ok(Self {
                program: node,
                args: vec![dist_index.display().to_string()],
            });
        }

        if ts_index.is_file() {
            return Ok(Self {
                program: find_ts_node(&server_dir),
                args: vec!["--files".to_string(), ts_index.display().to_string()],
            });
        }

        Err(FixtureError::ServerNotFound(server_dir))
    }
}

fn find_ts_node(server_dir: &Path) -> PathBuf {
    server_dir
        .ancestors()
        .map(|dir| dir.join("node_modules").join(".bin").join("ts-node"))
        .find(|candidate| candidate.is_file())
        .or_else(|| which::which("ts-node").ok())
        .unwrap_or_else(|| PathBuf::from("ts-node"))
}
