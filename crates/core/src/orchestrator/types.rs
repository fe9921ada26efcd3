//! Types for the job orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::artifact::ArtifactRef;
use crate::error::{ErrorInfo, ErrorKind};
use crate::identity::{JobKey, MediaKind};

/// Final result of a job, shared by every waiter.
pub type JobOutcome = Result<ArtifactRef, ErrorInfo>;

/// Lifecycle state of a job.
///
/// `Pending -> Running -> {Completed, Failed}` and `Pending -> Cancelled`.
/// A retry moves `Running` back to `Pending`; a retry nobody waits for is
/// cancelled from there. Terminal states are final.
///
/// `Orchestrator::stop` is the one exception to these edges: it settles every
/// unfinished job, running ones included, as `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub key: JobKey,
    pub state: JobState,
    pub source_url: String,
    /// Canonical encoding descriptor, e.g. `audio/best`.
    pub encoding: String,
    pub media_kind: MediaKind,
    /// Executions started so far.
    pub attempt: u32,
    /// Number of live waiter registrations.
    pub requesters: usize,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    /// Terminal error, or the last retryable error while a retry is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the worker pool is running.
    pub running: bool,
    /// Size of the worker pool.
    pub workers: usize,
    /// Configured pending queue bound.
    pub queue_capacity: usize,
    /// Jobs waiting for a worker, including those backing off for a retry.
    pub pending_count: usize,
    /// Jobs currently executing.
    pub running_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub cancelled_count: usize,
}

/// Errors returned by `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The pending queue is full and no idle worker can take more.
    #[error("overloaded: {pending} jobs pending (capacity {capacity})")]
    Overloaded { pending: usize, capacity: usize },

    /// The orchestrator has been stopped.
    #[error("orchestrator is not accepting jobs")]
    NotRunning,
}

impl SubmitError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Overloaded
    }
}

/// Errors returned by `wait`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The wait elapsed. The registration is intact and the job continues.
    #[error("timed out waiting for job")]
    Timeout,

    /// The job reached `Failed` or `Cancelled`.
    #[error("{0}")]
    Failed(ErrorInfo),
}

impl WaitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::Failed(info) => info.kind,
        }
    }
}
