use std::fmt;
use std::time::Duration;

use qedit_core::job::JobId;

/// Which resource gate a caller contended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Load,
    Generate,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("model load"),
            Self::Generate => f.write_str("generation"),
        }
    }
}

/// Which processing phase exceeded its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Generate,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("Model load"),
            Self::Generate => f.write_str("Generation"),
        }
    }
}

/// Errors surfaced synchronously to queue callers.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Admission rejected; retry after backoff.
    #[error("Queue is full (max {max_size} jobs)")]
    QueueFull { max_size: usize },

    /// Never submitted, or already reaped.
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// A resource gate is held; administrative paths fail fast on this.
    #[error("Resource busy: {0} in progress")]
    Busy(Gate),
}

/// Processing failure recorded on a job. Never returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessError {
    #[error("{0}")]
    Failed(String),

    #[error("{phase} timed out after {}s", .after.as_secs_f64())]
    Timeout { phase: Phase, after: Duration },
}

impl ProcessError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
