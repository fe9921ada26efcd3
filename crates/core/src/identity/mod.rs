//! Identity resolution: turns a raw source URL and a requested encoding into
//! the canonical [`JobKey`] used for deduplication.

mod resolver;
mod types;

pub use resolver::{canonicalize_format, normalize_source_url, resolve};
pub use types::{
    EncodingSpec, FormatRequest, FormatSelector, JobKey, MediaKind, ResolvedRequest, WorkSpec,
};

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors produced while resolving a request. All of them are client errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid job key: {0}")]
    InvalidKey(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}
