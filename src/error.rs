//! Error types for fixture setup and teardown

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while provisioning or releasing the proxy fixture.
///
/// Everything raised during setup is fatal: nothing in this crate retries.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// No ephemeral port could be obtained from the OS.
    #[error("Failed to allocate a free port: {0}")]
    Allocation(#[source] std::io::Error),

    /// Repository initialization failed (git or filesystem).
    #[error("Failed to bootstrap repository: {0}")]
    Bootstrap(String),

    /// The server wrote to stderr before signalling readiness.
    #[error("Proxy server failed to start: {0}")]
    StartupFailure(String),

    /// The readiness deadline elapsed; the process has been killed.
    #[error("Timed out after {}s waiting for proxy server", .0.as_secs())]
    StartupTimeout(Duration),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Proxy server entry point not found in {0}")]
    ServerNotFound(PathBuf),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Directory removal failed for a reason other than "already gone".
    #[error("Failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
