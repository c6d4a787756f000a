use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::readiness::{ReadinessSignal, DEFAULT_STARTUP_TIMEOUT};

/// Everything needed to start one supervised process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra variables layered over the inherited environment
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
    /// Port allocated for the process; reported if the readiness line omits it
    pub port: u16,
    pub readiness: ReadinessSignal,
    pub timeout: Duration,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>, port: u16) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: working_dir.into(),
            port,
            readiness: ReadinessSignal::default(),
            timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessSignal) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    pub(crate) fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.current_dir(&self.working_dir);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // A dropped supervisor must never leave the server running
        cmd.kill_on_drop(true);

        cmd
    }
}
