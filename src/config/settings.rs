use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::supervisor::{DEFAULT_READY_PREFIX, DEFAULT_STARTUP_TIMEOUT};

/// Settings file looked up in the working directory when none is given
pub const SETTINGS_FILE: &str = "proxy-fixture.toml";

/// Example settings file contents
pub const EXAMPLE_SETTINGS: &str = include_str!("proxy-fixture.toml.example");

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// How the fixture provisions and launches the proxy server
#[derive(Debug, Clone)]
pub struct FixtureSettings {
    /// Directory holding per-run repositories
    pub temp_root: PathBuf,
    /// Prefix of generated repository directory names
    pub repo_prefix: String,
    /// Proxy server package directory (also the server's working directory)
    pub server_dir: PathBuf,
    /// Explicit server command; resolved from `server_dir` when unset
    pub server_command: Option<Vec<String>>,
    pub ready_prefix: String,
    pub startup_timeout: Duration,
    /// Environment variable carrying the allocated port
    pub port_env: String,
    /// Path appended to `http://localhost:<port>` for the proxy URL
    pub api_path: String,
    /// Shared test configuration file kept in sync with the fixture
    pub config_path: Option<PathBuf>,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            temp_root: PathBuf::from(".temp"),
            repo_prefix: "proxy-test-repo".to_string(),
            server_dir: PathBuf::from("packages/netlify-cms-proxy-server"),
            server_command: None,
            ready_prefix: DEFAULT_READY_PREFIX.to_string(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            port_env: "PORT".to_string(),
            api_path: "/api/v1".to_string(),
            config_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlServerSettings {
    pub dir: Option<PathBuf>,
    pub command: Option<Vec<String>>,
    pub ready_prefix: Option<String>,
    pub startup_timeout_secs: Option<u64>,
    pub port_env: Option<String>,
    pub api_path: Option<String>,
}

/// TOML representation of the settings file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlSettings {
    pub temp_root: Option<PathBuf>,
    pub repo_prefix: Option<String>,
    pub config_path: Option<PathBuf>,
    pub server: Option<TomlServerSettings>,
}

impl FixtureSettings {
    /// Load settings from `path`, or from [`SETTINGS_FILE`] if it exists,
    /// then apply `PROXY_FIXTURE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(SETTINGS_FILE).exists() => Self::from_file(Path::new(SETTINGS_FILE))?,
            None => Self::default(),
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&contents)?;

        // Relative paths in the file are relative to the file itself
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            settings.temp_root = base.join(&settings.temp_root);
            settings.server_dir = base.join(&settings.server_dir);
            settings.config_path = settings.config_path.map(|p| base.join(p));
        }
        tracing::debug!(path = %path.display(), "Loaded fixture settings");
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        let toml_settings: TomlSettings = toml::from_str(contents)?;
        let mut settings = Self::default();

        if let Some(temp_root) = toml_settings.temp_root {
            settings.temp_root = temp_root;
        }
        if let Some(prefix) = toml_settings.repo_prefix {
            settings.repo_prefix = prefix;
        }
        settings.config_path = toml_settings.config_path;

        if let Some(server) = toml_settings.server {
            if let Some(dir) = server.dir {
                settings.server_dir = dir;
            }
            if let Some(command) = server.command {
                if command.is_empty() {
                    return Err(SettingsError::InvalidValue {
                        key: "server.command".into(),
                        value: "[]".into(),
                    });
                }
                settings.server_command = Some(command);
            }
            if let Some(prefix) = server.ready_prefix {
                settings.ready_prefix = prefix;
            }
            if let Some(secs) = server.startup_timeout_secs {
                settings.startup_timeout = Duration::from_secs(secs);
            }
            if let Some(port_env) = server.port_env {
                settings.port_env = port_env;
            }
            if let Some(api_path) = server.api_path {
                settings.api_path = api_path;
            }
        }

        Ok(settings)
    }

    /// Overlay `PROXY_FIXTURE_*` variables looked up through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("PROXY_FIXTURE_SERVER_DIR") {
            self.server_dir = PathBuf::from(dir);
        }
        if let Some(root) = lookup("PROXY_FIXTURE_TEMP_ROOT") {
            self.temp_root = PathBuf::from(root);
        }
        if let Some(path) = lookup("PROXY_FIXTURE_CONFIG") {
            self.config_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = lookup("PROXY_FIXTURE_TIMEOUT_SECS") {
            let parsed = secs
                .trim()
                .parse::<u64>()
                .map_err(|_| SettingsError::InvalidValue {
                    key: "PROXY_FIXTURE_TIMEOUT_SECS".into(),
                    value: secs.clone(),
                })?;
            self.startup_timeout = Duration::from_secs(parsed);
        }
        Ok(())
    }
}
