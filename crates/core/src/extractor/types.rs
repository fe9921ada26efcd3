//! Types for the extractor adapter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata describing a source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub thumbnail_url: Option<String>,
    pub encodings: Vec<EncodingOption>,
}

/// One downloadable encoding of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingOption {
    pub id: String,
    /// e.g. `1280x720` for video, `128k` for audio-only streams.
    pub resolution_or_bitrate: String,
    pub container: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

/// A finished file inside an [`EncodeSink`](crate::artifact::EncodeSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub path: PathBuf,
    pub bytes_written: u64,
    /// Source title, used as the artifact's display name.
    pub title: Option<String>,
}
