use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::error::FixtureError;

use super::launch::LaunchSpec;
use super::readiness::{classify_batch, ReadinessOutcome, StreamEvent};

/// Lifecycle state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Starting,
    Ready,
    Failed,
    TimedOut,
    Terminated,
}

/// A spawned server and what we know about it.
///
/// The child handle is only reachable through [`ProcessSupervisor`].
#[derive(Debug)]
pub struct SupervisedProcess {
    child: Option<Child>,
    pid: Option<u32>,
    port: u16,
    working_dir: PathBuf,
    state: ProcessState,
}

impl SupervisedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Port the server is reachable on: the announced port once ready,
    /// otherwise the allocated one
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Whether the OS process is still alive (reaps it if it has exited)
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Kill the process if it is still running.
    ///
    /// Idempotent: calling it again, or after the process exited on its own,
    /// is a no-op.
    async fn terminate(&mut self) -> Result<(), FixtureError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        self.state = ProcessState::Terminated;

        if let Some(status) = child.try_wait()? {
            tracing::debug!(pid = ?self.pid, ?status, "Server already exited");
            return Ok(());
        }

        if let Err(e) = child.start_kill() {
            // Lost a race with a natural exit
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            return Err(e.into());
        }
        let status = child.wait().await?;
        tracing::info!(pid = ?self.pid, port = self.port, ?status, "Server terminated");
        Ok(())
    }
}

/// Owner of the at-most-one supervised process for a test run
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    process: Option<SupervisedProcess>,
}

/// What woke the readiness loop
enum Step {
    Events(Vec<StreamEvent>),
    StreamsClosed,
    Exited(ExitStatus),
    Deadline,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self { process: None }
    }

    pub fn process(&self) -> Option<&SupervisedProcess> {
        self.process.as_ref()
    }

    pub fn process_mut(&mut self) -> Option<&mut SupervisedProcess> {
        self.process.as_mut()
    }

    /// Whether a process is currently running under supervision
    pub fn is_active(&mut self) -> bool {
        self.process.as_mut().is_some_and(|p| p.is_running())
    }

    /// Spawn a process and wait until it is ready, fails, or times out.
    ///
    /// The process stays under supervision after `Ready` and `Failed` so that
    /// [`terminate`](Self::terminate) can release it; after `TimedOut` it has
    /// already been killed. Only spawn errors are returned as `Err`.
    pub async fn launch(&mut self, spec: LaunchSpec) -> Result<ReadinessOutcome, FixtureError> {
        if self.process.is_some() {
            tracing::warn!("Launching while a supervised process exists; terminating it first");
            if let Err(e) = self.terminate().await {
                tracing::warn!(error = %e, "Failed to terminate previous process");
            }
        }

        let mut child = spec
            .build_command()
            .spawn()
            .map_err(|source| FixtureError::Spawn {
                program: spec.program_name(),
                source,
            })?;
        let pid = child.id();
        tracing::info!(
            pid = ?pid,
            port = spec.port,
            program = %spec.program_name(),
            cwd = %spec.working_dir.display(),
            "Spawned server"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_stdout(stdout, pid, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(stderr, pid, tx.clone());
        }
        drop(tx);

        let outcome = await_readiness(&mut child, rx, &spec).await?;

        let (child, state, port) = match &outcome {
            ReadinessOutcome::Ready { port } => {
                tracing::info!(pid = ?pid, port, "Server ready");
                (Some(child), ProcessState::Ready, *port)
            }
            ReadinessOutcome::Failed { reason } => {
                tracing::error!(pid = ?pid, %reason, "Server failed to start");
                (Some(child), ProcessState::Failed, spec.port)
            }
            ReadinessOutcome::TimedOut => {
                tracing::error!(
                    pid = ?pid,
                    timeout_secs = spec.timeout.as_secs(),
                    "Timed out waiting for server"
                );
                (None, ProcessState::TimedOut, spec.port)
            }
        };

        self.process = Some(SupervisedProcess {
            child,
            pid,
            port,
            working_dir: spec.working_dir,
            state,
        });

        Ok(outcome)
    }

    /// Kill the supervised process, if any. Safe to call repeatedly.
    pub async fn terminate(&mut self) -> Result<(), FixtureError> {
        match self.process.as_mut() {
            Some(process) => process.terminate().await,
            None => Ok(()),
        }
    }

    /// Terminate and forget the supervised process
    pub async fn release(&mut self) -> Result<(), FixtureError> {
        let result = self.terminate().await;
        self.process = None;
        result
    }
}

/// Forward stdout line by line while the readiness loop is listening.
///
/// Invalid UTF-8 is replaced rather than treated as an error; the pipe is
/// drained until EOF so the server never writes into a closed pipe.
fn forward_stdout<R>(reader: R, pid: Option<u32>, tx: mpsc::UnboundedSender<StreamEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(['\r', '\n'])
                        .to_string();
                    tracing::info!(pid = ?pid, "server:stdout: {}", line.trim());
                    // Receiver is gone once an outcome is decided; keep draining
                    let _ = tx.send(StreamEvent::Stdout(line));
                }
                Err(e) => {
                    tracing::debug!(pid = ?pid, error = %e, "Server stdout read error");
                    break;
                }
            }
        }
    });
}

/// Forward stderr as it arrives, one event per read.
///
/// Any stderr data is decisive before readiness, so chunks are not held back
/// waiting for a newline.
fn forward_stderr<R>(mut reader: R, pid: Option<u32>, tx: mpsc::UnboundedSender<StreamEvent>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                    tracing::warn!(pid = ?pid, "server:stderr: {}", chunk.trim_end());
                    let _ = tx.send(StreamEvent::Stderr(chunk));
                }
                Err(e) => {
                    tracing::debug!(pid = ?pid, error = %e, "Server stderr read error");
                    break;
                }
            }
        }
    });
}

/// Race output events, process exit and the deadline until one is decisive
async fn await_readiness(
    child: &mut Child,
    mut rx: mpsc::UnboundedReceiver<StreamEvent>,
    spec: &LaunchSpec,
) -> Result<ReadinessOutcome, FixtureError> {
    let deadline = tokio::time::sleep(spec.timeout);
    tokio::pin!(deadline);

    let mut streams_open = true;
    let mut exit_status: Option<ExitStatus> = None;

    loop {
        let step = tokio::select! {
            event = rx.recv(), if streams_open => match event {
                Some(first) => {
                    let mut batch = vec![first];
                    while let Ok(more) = rx.try_recv() {
                        batch.push(more);
                    }
                    Step::Events(batch)
                }
                None => Step::StreamsClosed,
            },
            status = child.wait(), if exit_status.is_none() => Step::Exited(status?),
            _ = &mut deadline => Step::Deadline,
        };

        match step {
            Step::Events(batch) => {
                if let Some(outcome) = classify_batch(&spec.readiness, spec.port, &batch) {
                    return Ok(outcome);
                }
            }
            Step::StreamsClosed => streams_open = false,
            Step::Exited(status) => exit_status = Some(status),
            Step::Deadline => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "Kill after deadline failed");
                }
                if let Err(e) = child.wait().await {
                    tracing::debug!(error = %e, "Wait after deadline kill failed");
                }
                return Ok(ReadinessOutcome::TimedOut);
            }
        }

        // Output is fully drained and the process is gone: nothing left to wait for
        if let (false, Some(status)) = (streams_open, exit_status) {
            return Ok(ReadinessOutcome::Failed {
                reason: format!("server exited with {status} before signalling readiness"),
            });
        }
    }
}
