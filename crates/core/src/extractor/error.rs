//! Error types for the extractor adapter.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors reported by an extractor.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The source is not handled by this extractor.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// Metadata could not be extracted.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Transient transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Stream could not be downloaded, decoded or muxed.
    #[error("decode error: {0}")]
    Decode(String),

    /// Extractor binary not found.
    #[error("extractor binary not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// I/O error while driving the extractor.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractorError {
    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedSource(_) => ErrorKind::UnsupportedSource,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::ExtractionFailed(_)
            | Self::Decode(_)
            | Self::BinaryNotFound { .. }
            | Self::Io(_) => ErrorKind::ExtractionFailed,
        }
    }
}
