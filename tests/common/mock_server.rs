//! Mock proxy server fixtures
//!
//! Builds fixture settings whose server command is a small shell script, so
//! tests can drive each readiness outcome without node installed.

use std::path::Path;
use std::time::Duration;

use proxy_fixture::FixtureSettings;

pub const READY_PREFIX: &str = "Netlify CMS Proxy Server listening on port";

/// Prints the readiness line for `$PORT`, then idles until killed.
/// Refuses to start unless `GIT_REPO_DIRECTORY` is an absolute path to a git
/// repository.
pub const HEALTHY_SERVER: &str = r#"
case "$GIT_REPO_DIRECTORY" in
  /*) ;;
  *) echo "relative repository path: $GIT_REPO_DIRECTORY" >&2; exit 1 ;;
esac
if [ ! -d "$GIT_REPO_DIRECTORY/.git" ]; then
  echo "no repository at $GIT_REPO_DIRECTORY" >&2
  exit 1
fi
echo "starting"
echo "Netlify CMS Proxy Server listening on port $PORT"
exec sleep 60
"#;

/// Writes an error before ever becoming ready.
pub const CRASHING_SERVER: &str = r#"
echo "Error: listen EADDRINUSE: address already in use" >&2
exec sleep 60
"#;

/// Never prints anything.
pub const SILENT_SERVER: &str = "exec sleep 60";

/// Settings rooted in `root` that run `script` as the proxy server
pub fn settings_for(root: &Path, script: &str) -> FixtureSettings {
    FixtureSettings {
        temp_root: root.join(".temp"),
        server_dir: root.to_path_buf(),
        server_command: Some(vec!["/bin/sh".into(), "-c".into(), script.into()]),
        ready_prefix: READY_PREFIX.to_string(),
        startup_timeout: Duration::from_secs(10),
        ..FixtureSettings::default()
    }
}

/// TOML settings file equivalent to [`settings_for`], for CLI tests
#[allow(dead_code)] // Used by the CLI tests only
pub fn settings_toml(script: &str, timeout_secs: u64) -> String {
    let command = toml::Value::Array(vec![
        "/bin/sh".into(),
        "-c".into(),
        script.into(),
    ]);
    format!(
        "temp_root = \".temp\"\n\n[server]\ndir = \".\"\ncommand = {command}\nready_prefix = \"{READY_PREFIX}\"\nstartup_timeout_secs = {timeout_secs}\n"
    )
}

/// Whether a process with this pid still exists
pub fn pid_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}
