//! Extractor adapter: the boundary to the external capability that reads
//! video-hosting pages, resolves streams and transcodes them.
//!
//! The orchestrator only ever talks to the [`Extractor`] trait. The shipped
//! implementation drives the `yt-dlp` binary as a child process.

mod config;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use config::{ExtractorBackend, ExtractorConfig, YtDlpConfig};
pub use error::ExtractorError;
pub use traits::Extractor;
pub use types::{EncodedFile, EncodingOption, MediaMetadata};
pub use ytdlp::YtDlpExtractor;

use std::sync::Arc;

/// Builds the configured extractor backend.
pub fn create_extractor(config: &ExtractorConfig) -> Arc<dyn Extractor> {
    match config.backend {
        ExtractorBackend::YtDlp => Arc::new(YtDlpExtractor::new(config.yt_dlp.clone())),
    }
}
