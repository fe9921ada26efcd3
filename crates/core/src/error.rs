//! Failure taxonomy shared by the orchestrator, the extractor adapter and the
//! HTTP surface.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of every failure a caller can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad URL or format descriptor. Never retried.
    InvalidInput,
    /// Queue and worker pool are saturated. The client may retry later.
    Overloaded,
    /// The extractor could not make sense of the source.
    ExtractionFailed,
    /// The source is not handled by the extractor.
    UnsupportedSource,
    /// Transient transport failure. Retried up to the configured ceiling.
    NetworkError,
    /// Disk full, permissions, rename failures.
    StorageFailure,
    /// A caller-side wait elapsed. The job keeps running.
    Timeout,
    /// Every requester withdrew before a worker claimed the job.
    Cancelled,
}

impl ErrorKind {
    /// Whether the orchestrator should re-enqueue a job that failed this way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Overloaded => "overloaded",
            Self::ExtractionFailed => "extraction_failed",
            Self::UnsupportedSource => "unsupported_source",
            Self::NetworkError => "network_error",
            Self::StorageFailure => "storage_failure",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure recorded on a job and handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ErrorInfo {}
