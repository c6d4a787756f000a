//! Readiness detection for supervised servers
//!
//! The startup race is decided from a stream of tagged output events. Events
//! that are already queued when a decision is made form one batch; within a
//! batch a matching stdout line beats stderr output.

use std::time::Duration;

/// Line prefix the proxy server prints once it is accepting connections.
pub const DEFAULT_READY_PREFIX: &str = "Netlify CMS Proxy Server listening on port";

/// How long a server may take to become ready before it is killed.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Terminal result of one supervised launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessOutcome {
    /// The readiness line was seen on stdout.
    Ready { port: u16 },
    /// Output reached stderr first, or the process exited early.
    Failed { reason: String },
    /// Nothing decisive happened before the deadline.
    TimedOut,
}

impl ReadinessOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessOutcome::Ready { .. })
    }
}

/// Predicate recognizing the readiness line on stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessSignal {
    prefix: String,
}

impl ReadinessSignal {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Whether a stdout line announces readiness
    pub fn matches(&self, line: &str) -> bool {
        line.trim().starts_with(&self.prefix)
    }

    /// Port number printed right after the prefix, if any
    ///
    /// Accepts `"<prefix> 4000"` as well as `"<prefix>: 4000 (pid 12)"`.
    pub fn announced_port(&self, line: &str) -> Option<u16> {
        let rest = line.trim().strip_prefix(&self.prefix)?;
        let digits: String = rest
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace())
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

impl Default for ReadinessSignal {
    fn default() -> Self {
        Self::prefix(DEFAULT_READY_PREFIX)
    }
}

/// Output read from a supervised process: a stdout line, or a raw stderr chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    Stdout(String),
    Stderr(String),
}

/// Decide the outcome for a batch of events, if the batch is decisive.
///
/// `fallback_port` is reported when the readiness line carries no port.
pub(crate) fn classify_batch(
    signal: &ReadinessSignal,
    fallback_port: u16,
    batch: &[StreamEvent],
) -> Option<ReadinessOutcome> {
    let ready_line = batch.iter().find_map(|event| match event {
        StreamEvent::Stdout(line) if signal.matches(line) => Some(line),
        _ => None,
    });
    if let Some(line) = ready_line {
        let port = signal.announced_port(line).unwrap_or(fallback_port);
        return Some(ReadinessOutcome::Ready { port });
    }

    let stderr: Vec<&str> = batch
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Stderr(chunk) => Some(chunk.trim_end()),
            _ => None,
        })
        .collect();
    if stderr.is_empty() {
        return None;
    }

    Some(ReadinessOutcome::Failed {
        reason: stderr.join("\n"),
    })
}
