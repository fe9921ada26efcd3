//! Types for the artifact store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::StoreError;
use crate::identity::MediaKind;

const HANDLE_LEN: usize = 32;
const MAX_DISPLAY_NAME: usize = 120;

/// Opaque storage key of a published artifact (UUID v4, simple form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    /// Issues a fresh handle.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validates a caller-supplied handle before any filesystem access.
    ///
    /// Rejects parent segments, separators, absolute prefixes and anything
    /// that is not exactly 32 lowercase hex characters.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        if raw.is_empty() {
            return Err(StoreError::InvalidHandle("empty handle".to_string()));
        }
        if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
            return Err(StoreError::InvalidHandle(format!("path components in {raw:?}")));
        }
        let well_formed = raw.len() == HANDLE_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(StoreError::InvalidHandle(format!("malformed handle {raw:?}")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a completed file inside the store. Jobs hold this, never
/// the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub handle: ArtifactHandle,
    pub size_bytes: u64,
    pub media_kind: MediaKind,
    /// File extension of the payload, e.g. `mp4`, `mp3`.
    pub container: String,
    /// Human readable file name offered to clients.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl ArtifactRef {
    /// MIME type used when serving the payload.
    pub fn content_type(&self) -> &'static str {
        match self.container.as_str() {
            "mp4" | "m4v" => "video/mp4",
            "webm" => "video/webm",
            "mkv" => "video/x-matroska",
            "mp3" => "audio/mpeg",
            "m4a" => "audio/mp4",
            "opus" | "ogg" => "audio/ogg",
            "wav" => "audio/wav",
            "flac" => "audio/flac",
            _ => match self.media_kind {
                MediaKind::Video => "video/mp4",
                MediaKind::Audio => "audio/mpeg",
            },
        }
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Artifacts deleted.
    pub removed: Vec<ArtifactHandle>,
    /// Expired artifacts kept because a reader holds a lease.
    pub skipped_leased: usize,
}

/// Point-in-time store statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub artifacts: usize,
    pub total_bytes: u64,
    pub open_readers: usize,
}

/// Builds the client-facing file name from an untrusted title.
///
/// Keeps letters, digits, spaces, `-`, `_` and `.`; collapses whitespace;
/// strips leading dots; falls back to `download`.
pub fn display_name(suggested: &str, container: &str) -> String {
    let cleaned: String = suggested
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_start_matches('.').trim();

    let mut stem: String = trimmed.chars().take(MAX_DISPLAY_NAME).collect();
    if stem.is_empty() {
        stem = "download".to_string();
    }

    if container.is_empty() {
        stem
    } else {
        format!("{stem}.{container}")
    }
}
