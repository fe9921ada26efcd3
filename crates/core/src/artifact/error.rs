//! Error types for the artifact store.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur in the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The handle is malformed or tries to escape the store root.
    #[error("invalid artifact handle: {0}")]
    InvalidHandle(String),

    /// No published artifact has this handle.
    #[error("artifact not found: {0}")]
    NotFound(String),

    /// Filesystem operation failed.
    #[error("{operation} failed for {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Sidecar metadata could not be encoded or decoded.
    #[error("artifact metadata error for {path}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidHandle(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) | Self::Io { .. } | Self::Metadata { .. } => {
                ErrorKind::StorageFailure
            }
        }
    }
}
