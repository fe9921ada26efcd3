//! Types for identity resolution.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::IdentityError;

/// Number of hex characters kept from the SHA-256 digest.
const KEY_LEN: usize = 32;

/// Deterministic identifier of one logical unit of work.
///
/// Derived from the canonical source URL and the canonical encoding
/// descriptor; two requests with equal keys share one execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobKey(String);

impl JobKey {
    /// Derives the key for a canonical work spec.
    pub fn derive(work: &WorkSpec) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(work.source_url.as_bytes());
        hasher.update(b"\n");
        hasher.update(work.encoding.descriptor().as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self(digest[..KEY_LEN].to_string())
    }

    /// Parses a key received from a client (e.g. a URL path segment).
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let valid = raw.len() == KEY_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(IdentityError::InvalidKey(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the client wants out of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw format request as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRequest {
    pub kind: MediaKind,
    #[serde(default)]
    pub format_id: Option<String>,
}

impl FormatRequest {
    pub fn video(format_id: impl Into<String>) -> Self {
        Self {
            kind: MediaKind::Video,
            format_id: Some(format_id.into()),
        }
    }

    pub fn best(kind: MediaKind) -> Self {
        Self {
            kind,
            format_id: None,
        }
    }
}

/// Which stream to pick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum FormatSelector {
    /// Let the extractor choose the best available stream(s).
    Best,
    /// A specific extractor format id (e.g. `137+140`, `22`).
    Explicit(String),
}

/// Canonical encoding descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodingSpec {
    pub kind: MediaKind,
    pub format: FormatSelector,
}

impl EncodingSpec {
    /// Stable textual form used for key derivation, e.g. `video/best`.
    pub fn descriptor(&self) -> String {
        match &self.format {
            FormatSelector::Best => format!("{}/best", self.kind),
            FormatSelector::Explicit(id) => format!("{}/{}", self.kind, id),
        }
    }
}

/// Everything a worker needs to execute a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkSpec {
    /// Canonical source URL.
    pub source_url: String,
    pub encoding: EncodingSpec,
}

/// Output of [`resolve`](super::resolve).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub key: JobKey,
    pub work: WorkSpec,
}
