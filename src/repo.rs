//! Seed git repository for the proxy server

use std::path::Path;

use tokio::process::Command;

use crate::error::FixtureError;

const TEST_USER_EMAIL: &str = "cms-cypress-test@netlify.com";
const TEST_USER_NAME: &str = "cms-cypress-test";
const README: &str = "README.md";

/// Replace `dir` with a fresh repository holding a single commit.
///
/// The repository has:
/// - a local test identity (no prompts)
/// - commit signing disabled
/// - an empty `README.md` committed as `initial commit`
pub async fn init_repo(dir: &Path) -> Result<(), FixtureError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!(path = %dir.display(), "Removed existing repository"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(bootstrap_io(dir, e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| bootstrap_io(dir, e))?;

    git(dir, &["init"]).await?;
    git(dir, &["config", "user.email", TEST_USER_EMAIL]).await?;
    git(dir, &["config", "user.name", TEST_USER_NAME]).await?;
    git(dir, &["config", "commit.gpgsign", "false"]).await?;

    tokio::fs::write(dir.join(README), "")
        .await
        .map_err(|e| bootstrap_io(dir, e))?;
    git(dir, &["add", README]).await?;
    git(
        dir,
        &[
            "commit",
            "-m",
            "initial commit",
            "--no-verify",
            "--no-gpg-sign",
            README,
        ],
    )
    .await?;

    tracing::info!(path = %dir.display(), "Initialized test repository");
    Ok(())
}

async fn git(dir: &Path, args: &[&str]) -> Result<(), FixtureError> {
    tracing::debug!(path = %dir.display(), ?args, "git");
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| FixtureError::Bootstrap(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        return Err(FixtureError::Bootstrap(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

fn bootstrap_io(dir: &Path, e: std::io::Error) -> FixtureError {
    FixtureError::Bootstrap(format!("{}: {e}", dir.display()))
}
