//! Configuration for the extractor adapter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Extractor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractorConfig {
    #[serde(default)]
    pub backend: ExtractorBackend,
    #[serde(default)]
    pub yt_dlp: YtDlpConfig,
}

/// Available extractor backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorBackend {
    #[default]
    YtDlp,
}

/// Configuration for the `yt-dlp` backed extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpConfig {
    /// Path to the yt-dlp binary.
    #[serde(default = "default_binary_path")]
    pub binary_path: PathBuf,

    /// Socket timeout passed to yt-dlp (seconds).
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_secs: u64,

    /// Wall-clock limit for a metadata lookup (seconds).
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,

    /// Wall-clock limit for one download + transcode (seconds).
    #[serde(default = "default_process_timeout")]
    pub process_timeout_secs: u64,

    /// Target codec for audio extraction.
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Target quality for audio extraction (yt-dlp `--audio-quality`).
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Additional arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_binary_path() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_socket_timeout() -> u64 {
    10
}

fn default_metadata_timeout() -> u64 {
    60
}

fn default_process_timeout() -> u64 {
    1800 // 30 minutes
}

fn default_audio_format() -> String {
    "mp3".to_string()
}

fn default_audio_quality() -> String {
    "192K".to_string()
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            socket_timeout_secs: default_socket_timeout(),
            metadata_timeout_secs: default_metadata_timeout(),
            process_timeout_secs: default_process_timeout(),
            audio_format: default_audio_format(),
            audio_quality: default_audio_quality(),
            extra_args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = YtDlpConfig::default();
        assert_eq!(config.binary_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.socket_timeout_secs, 10);
        assert_eq!(config.audio_format, "mp3");
        assert_eq!(config.audio_quality, "192K");
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            backend = "yt_dlp"

            [yt_dlp]
            process_timeout_secs = 60
            extra_args = ["--force-ipv4"]
        "#;
        let config: ExtractorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.backend, ExtractorBackend::YtDlp);
        assert_eq!(config.yt_dlp.process_timeout_secs, 60);
        assert_eq!(config.yt_dlp.extra_args, vec!["--force-ipv4".to_string()]);
        assert_eq!(config.yt_dlp.metadata_timeout_secs, 60);
    }
}
