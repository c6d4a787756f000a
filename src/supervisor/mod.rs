//! Process supervision and readiness detection

mod launch;
mod process;
mod readiness;

pub use launch::LaunchSpec;
pub use process::{ProcessState, ProcessSupervisor, SupervisedProcess};
pub use readiness::{
    ReadinessOutcome, ReadinessSignal, DEFAULT_READY_PREFIX, DEFAULT_STARTUP_TIMEOUT,
};
