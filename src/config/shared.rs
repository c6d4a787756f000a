//! Shared test configuration
//!
//! The document the rest of the test run reads to reach the proxy server.
//! It is an explicit value owned by the fixture rather than a process-wide
//! global, and can be mirrored into a `.json` or `.toml` file on disk.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::error::FixtureError;

/// Deep-mergeable configuration document
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureConfig {
    root: Value,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl FixtureConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Merge `patch` into the document (see [`deep_merge`])
    pub fn merge(&mut self, patch: &Value) {
        deep_merge(&mut self.root, patch);
    }

    /// Look up a dotted path such as `backend.proxy_url`
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.root, |value, key| value.get(key))
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.get("backend.proxy_url").and_then(Value::as_str)
    }

    /// Drop everything, ready for the next test run
    pub fn reset(&mut self) {
        self.root = Value::Object(Map::new());
    }
}

/// Patch publishing the proxy URL under `backend.proxy_url`
pub fn proxy_url_patch(url: &str) -> Value {
    json!({ "backend": { "proxy_url": url } })
}

/// Recursively merge `patch` into `target`.
///
/// Objects merge key by key, arrays merge index by index, anything else in
/// the patch replaces the target value.
pub fn deep_merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(target), Value::Array(patch)) => {
            for (idx, value) in patch.iter().enumerate() {
                match target.get_mut(idx) {
                    Some(existing) => deep_merge(existing, value),
                    None => target.push(value.clone()),
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
}

/// Configuration file that patches are written through to
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    format: FileFormat,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, FixtureError> {
        let path = path.into();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => FileFormat::Json,
            Some("toml") => FileFormat::Toml,
            _ => {
                return Err(FixtureError::Config(format!(
                    "unsupported config file type: {}",
                    path.display()
                )))
            }
        };
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file; a missing file is an empty document
    pub async fn load(&self) -> Result<FixtureConfig, FixtureError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FixtureConfig::new())
            }
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(FixtureConfig::new());
        }

        let root: Value = match self.format {
            FileFormat::Json => serde_json::from_str(&contents).map_err(|e| self.config_error(e))?,
            FileFormat::Toml => toml::from_str(&contents).map_err(|e| self.config_error(e))?,
        };
        Ok(FixtureConfig::from_value(root))
    }

    pub async fn save(&self, config: &FixtureConfig) -> Result<(), FixtureError> {
        let contents = match self.format {
            FileFormat::Json => {
                serde_json::to_string_pretty(config.as_value()).map_err(|e| self.config_error(e))?
            }
            FileFormat::Toml => {
                toml::to_string_pretty(config.as_value()).map_err(|e| self.config_error(e))?
            }
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }

    /// Read-modify-write: merge `patch` into whatever the file holds now
    pub async fn update(&self, patch: &Value) -> Result<(), FixtureError> {
        let mut on_disk = self.load().await?;
        on_disk.merge(patch);
        self.save(&on_disk).await?;
        tracing::debug!(path = %self.path.display(), "Updated shared config");
        Ok(())
    }

    fn config_error(&self, e: impl std::fmt::Display) -> FixtureError {
        FixtureError::Config(format!("{}: {e}", self.path.display()))
    }
}
