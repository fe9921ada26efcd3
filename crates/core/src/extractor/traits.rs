//! Trait definitions for the extractor adapter.

use async_trait::async_trait;

use super::error::ExtractorError;
use super::types::{EncodedFile, MediaMetadata};
use crate::artifact::EncodeSink;
use crate::identity::WorkSpec;

/// External capability that inspects and retrieves media.
///
/// Implementations are expected to be slow and blocking from the caller's
/// point of view; the orchestrator never calls them while holding the job
/// registry lock.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns the name of this extractor implementation.
    fn name(&self) -> &str;

    /// Looks up title, author, duration and the available encodings.
    ///
    /// Fails with `UnsupportedSource` or `ExtractionFailed`.
    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractorError>;

    /// Downloads and transcodes the requested stream into `sink`.
    ///
    /// Fails with `Network` (retryable) or `Decode` (not retryable).
    async fn fetch_and_encode(
        &self,
        work: &WorkSpec,
        sink: &EncodeSink,
    ) -> Result<EncodedFile, ExtractorError>;

    /// Validates that the extractor is properly configured and ready.
    async fn validate(&self) -> Result<(), ExtractorError>;
}
