//! Testing utilities and mock implementations.
//!
//! [`MockExtractor`] stands in for the external extraction tool so the
//! orchestrator and the HTTP surface can be exercised without network access
//! or a `yt-dlp` binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use reelfetch_core::testing::{fixtures, MockExtractor};
//!
//! let extractor = Arc::new(MockExtractor::new());
//! extractor.hold().await;
//!
//! let orchestrator = Orchestrator::new(config, extractor.clone(), store);
//! // ...
//! ```

mod mock_extractor;

pub use mock_extractor::MockExtractor;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::extractor::{EncodingOption, MediaMetadata};
    use crate::identity::{EncodingSpec, FormatSelector, JobKey, MediaKind, WorkSpec};

    /// Canonical work spec for a video id, best format.
    pub fn work_spec(video_id: &str, kind: MediaKind) -> WorkSpec {
        WorkSpec {
            source_url: format!("https://www.youtube.com/watch?v={}", video_id),
            encoding: EncodingSpec {
                kind,
                format: FormatSelector::Best,
            },
        }
    }

    /// Key and work spec for a video id, best format.
    pub fn keyed_work(video_id: &str, kind: MediaKind) -> (JobKey, WorkSpec) {
        let work = work_spec(video_id, kind);
        (JobKey::derive(&work), work)
    }

    /// Metadata with two muxed encodings.
    pub fn media_metadata() -> MediaMetadata {
        MediaMetadata {
            title: "Mock Video".to_string(),
            author: "Mock Channel".to_string(),
            duration_seconds: 212,
            thumbnail_url: Some("https://i.ytimg.com/vi/mock/hqdefault.jpg".to_string()),
            encodings: vec![
                EncodingOption {
                    id: "18".to_string(),
                    resolution_or_bitrate: "640x360".to_string(),
                    container: "mp4".to_string(),
                    note: "360p".to_string(),
                },
                EncodingOption {
                    id: "22".to_string(),
                    resolution_or_bitrate: "1280x720".to_string(),
                    container: "mp4".to_string(),
                    note: "720p".to_string(),
                },
            ],
        }
    }
}
