//! Fixture orchestration
//!
//! Sequences repository bootstrap, port allocation and server supervision,
//! and exposes the four entry points a test runner drives:
//!
//! - `setup_proxy`: pick a temp directory, merge caller options into the config
//! - `setup_proxy_test`: seed the repo, start the server, publish its URL
//! - `teardown_proxy_test` / `teardown_proxy`: kill the server, delete the directory

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{proxy_url_patch, ConfigStore, FixtureConfig, FixtureSettings};
use crate::error::FixtureError;
use crate::port::allocate_port;
use crate::repo::init_repo;
use crate::server::ServerCommand;
use crate::supervisor::{
    LaunchSpec, ProcessSupervisor, ReadinessOutcome, ReadinessSignal, SupervisedProcess,
};
use crate::util::{absolute_path, generate_repo_name, remove_dir_if_exists};

/// Environment variable carrying the repository path to the server
pub const GIT_REPO_DIRECTORY_ENV: &str = "GIT_REPO_DIRECTORY";

/// Opaque value passed between the entry points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskData {
    pub temp_dir: PathBuf,
}

/// Per-run state: the temp directory and the supervised server
#[derive(Debug, Default)]
pub struct FixtureContext {
    temp_dir: Option<PathBuf>,
    supervisor: ProcessSupervisor,
}

impl FixtureContext {
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn server(&self) -> Option<&SupervisedProcess> {
        self.supervisor.process()
    }
}

/// `http://localhost:<port><api_path>`
pub fn proxy_url(port: u16, api_path: &str) -> String {
    format!("http://localhost:{port}{api_path}")
}

/// Test fixture owning the proxy server for one test run
#[derive(Debug)]
pub struct ProxyFixture {
    settings: FixtureSettings,
    config: FixtureConfig,
    store: Option<ConfigStore>,
    context: FixtureContext,
}

impl ProxyFixture {
    pub fn new(settings: FixtureSettings) -> Result<Self, FixtureError> {
        let store = settings
            .config_path
            .as_ref()
            .map(|path| ConfigStore::new(path.clone()))
            .transpose()?;
        Ok(Self {
            settings,
            config: FixtureConfig::new(),
            store,
            context: FixtureContext::default(),
        })
    }

    pub fn settings(&self) -> &FixtureSettings {
        &self.settings
    }

    /// Shared configuration as seen by the rest of the test run
    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn context(&self) -> &FixtureContext {
        &self.context
    }

    /// Whether the supervised server process is alive
    pub fn is_server_running(&mut self) -> bool {
        self.context.supervisor.is_active()
    }

    /// Choose a fresh temp directory and merge `options` into the config.
    ///
    /// Nothing is created on disk and no process is started.
    pub async fn setup_proxy(&mut self, options: &Value) -> Result<TaskData, FixtureError> {
        let name = generate_repo_name(&self.settings.repo_prefix);
        let temp_dir = self.settings.temp_root.join(name);

        self.update_config(options).await?;
        self.context.temp_dir = Some(temp_dir.clone());

        tracing::info!(temp_dir = %temp_dir.display(), "Proxy fixture set up");
        Ok(TaskData { temp_dir })
    }

    /// Seed the repository, start the server and publish its URL.
    ///
    /// `Failed` and `TimedOut` outcomes abort with an error; teardown still
    /// releases whatever was started.
    pub async fn setup_proxy_test(&mut self, task: &TaskData) -> Result<(), FixtureError> {
        init_repo(&task.temp_dir).await?;

        let port = allocate_port().await?;
        let repo_dir = absolute_path(&task.temp_dir)?;
        let command = match &self.settings.server_command {
            Some(parts) => ServerCommand::from_parts(parts)?,
            None => ServerCommand::resolve(&self.settings.server_dir)?,
        };

        let spec = LaunchSpec::new(command.program, &self.settings.server_dir, port)
            .with_args(command.args)
            .with_env(GIT_REPO_DIRECTORY_ENV, repo_dir.display().to_string())
            .with_env(&self.settings.port_env, port.to_string())
            .with_readiness(ReadinessSignal::prefix(&self.settings.ready_prefix))
            .with_timeout(self.settings.startup_timeout);

        match self.context.supervisor.launch(spec).await? {
            ReadinessOutcome::Ready { port } => {
                let url = proxy_url(port, &self.settings.api_path);
                self.update_config(&proxy_url_patch(&url)).await?;
                tracing::info!(%url, repo = %repo_dir.display(), "Proxy server ready");
                Ok(())
            }
            ReadinessOutcome::Failed { reason } => Err(FixtureError::StartupFailure(reason)),
            ReadinessOutcome::TimedOut => {
                Err(FixtureError::StartupTimeout(self.settings.startup_timeout))
            }
        }
    }

    /// Stop the server and delete the test's directory
    pub async fn teardown_proxy_test(&mut self, task: &TaskData) -> Result<(), FixtureError> {
        self.release(task).await
    }

    /// Final teardown for the run: forgets the temp directory and clears the
    /// in-memory config so the next run starts empty. A config file on disk
    /// keeps its last contents.
    pub async fn teardown_proxy(&mut self, task: &TaskData) -> Result<(), FixtureError> {
        let result = self.release(task).await;
        self.context.temp_dir = None;
        self.config.reset();
        result
    }

    /// Terminate the server, then remove the directory, even if termination failed
    async fn release(&mut self, task: &TaskData) -> Result<(), FixtureError> {
        if let Err(e) = self.context.supervisor.release().await {
            tracing::warn!(error = %e, "Failed to terminate proxy server");
        }

        match remove_dir_if_exists(&task.temp_dir).await {
            Ok(removed) => {
                tracing::debug!(path = %task.temp_dir.display(), removed, "Removed temp directory");
                Ok(())
            }
            Err(source) => Err(FixtureError::Cleanup {
                path: task.temp_dir.clone(),
                source,
            }),
        }
    }

    async fn update_config(&mut self, patch: &Value) -> Result<(), FixtureError> {
        self.config.merge(patch);
        if let Some(store) = &self.store {
            store.update(patch).await?;
        }
        Ok(())
    }
}
