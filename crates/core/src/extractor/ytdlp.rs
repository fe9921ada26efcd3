//! `yt-dlp` backed extractor implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::config::YtDlpConfig;
use super::error::ExtractorError;
use super::traits::Extractor;
use super::types::{EncodedFile, EncodingOption, MediaMetadata};
use crate::artifact::EncodeSink;
use crate::identity::{FormatSelector, MediaKind, WorkSpec};
use crate::metrics;

const OUTPUT_STEM: &str = "media";
const FILE_MARKER: &str = "FILE=";
const TITLE_MARKER: &str = "TITLE=";

/// stderr fragments that point at a transient transport problem.
const NETWORK_MARKERS: &[&str] = &[
    "timed out",
    "connection reset",
    "connection refused",
    "connection aborted",
    "remote end closed connection",
    "temporary failure in name resolution",
    "name or service not known",
    "network is unreachable",
    "unable to download webpage",
    "incompleteread",
    "http error 429",
    "http error 500",
    "http error 502",
    "http error 503",
    "http error 504",
];

const UNSUPPORTED_MARKERS: &[&str] = &["unsupported url", "is not a valid url"];

#[derive(Debug, Clone, Copy)]
enum Phase {
    Metadata,
    Download,
}

/// Subset of `yt-dlp -J` output.
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    ext: Option<String>,
    resolution: Option<String>,
    format_note: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
}

/// Extractor that shells out to `yt-dlp`.
pub struct YtDlpExtractor {
    config: YtDlpConfig,
}

impl YtDlpExtractor {
    /// Creates a new extractor with the given configuration.
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Creates an extractor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(YtDlpConfig::default())
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
        ]
    }

    /// Builds arguments for a metadata lookup.
    fn build_metadata_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["-J".to_string()];
        args.extend(self.common_args());
        args.extend(self.config.extra_args.iter().cloned());
        args.push(url.to_string());
        args
    }

    /// Builds arguments for a download into `output_dir`.
    fn build_download_args(&self, work: &WorkSpec, output_dir: &Path) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "--no-progress".to_string(),
            "--no-simulate".to_string(),
            "-o".to_string(),
            output_dir
                .join(format!("{OUTPUT_STEM}.%(ext)s"))
                .to_string_lossy()
                .to_string(),
            "--print".to_string(),
            format!("after_move:{TITLE_MARKER}%(title)s"),
            "--print".to_string(),
            format!("after_move:{FILE_MARKER}%(filepath)s"),
        ]);

        match work.encoding.kind {
            MediaKind::Video => {
                let format = match &work.encoding.format {
                    FormatSelector::Best => "bestvideo+bestaudio/best".to_string(),
                    FormatSelector::Explicit(id) => id.clone(),
                };
                args.extend(["-f".to_string(), format]);
            }
            MediaKind::Audio => {
                let format = match &work.encoding.format {
                    FormatSelector::Best => "bestaudio/best".to_string(),
                    FormatSelector::Explicit(id) => id.clone(),
                };
                args.extend([
                    "-f".to_string(),
                    format,
                    "-x".to_string(),
                    "--audio-format".to_string(),
                    self.config.audio_format.clone(),
                    "--audio-quality".to_string(),
                    self.config.audio_quality.clone(),
                ]);
            }
        }

        args.extend(self.config.extra_args.iter().cloned());
        args.push(work.source_url.clone());
        args
    }

    /// Runs yt-dlp with a wall-clock limit. The child is killed on timeout.
    async fn run(&self, args: &[String], limit_secs: u64) -> Result<Output, ExtractorError> {
        debug!("Running {:?} {:?}", self.config.binary_path, args);

        let child = Command::new(&self.config.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractorError::BinaryNotFound {
                        path: self.config.binary_path.clone(),
                    }
                } else {
                    ExtractorError::Io(e)
                }
            })?;

        match timeout(Duration::from_secs(limit_secs), child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(ExtractorError::Network(format!(
                "yt-dlp timed out after {limit_secs} seconds"
            ))),
        }
    }

    fn parse_metadata(stdout: &[u8]) -> Result<MediaMetadata, ExtractorError> {
        let info: InfoJson = serde_json::from_slice(stdout)
            .map_err(|e| ExtractorError::ExtractionFailed(format!("invalid yt-dlp JSON: {e}")))?;

        // Muxed formats only.
        let encodings = info
            .formats
            .into_iter()
            .filter(|f| f.vcodec.as_deref() != Some("none") && f.acodec.as_deref() != Some("none"))
            .map(|f| EncodingOption {
                id: f.format_id,
                resolution_or_bitrate: f.resolution.unwrap_or_else(|| "unknown".to_string()),
                container: f.ext.unwrap_or_else(|| "mp4".to_string()),
                note: f.format_note.unwrap_or_default(),
            })
            .collect();

        Ok(MediaMetadata {
            title: info.title.unwrap_or_else(|| "Untitled video".to_string()),
            author: info
                .uploader
                .or(info.channel)
                .unwrap_or_else(|| "Unknown channel".to_string()),
            duration_seconds: info.duration.map(|d| d.max(0.0).round() as u64).unwrap_or(0),
            thumbnail_url: info.thumbnail,
            encodings,
        })
    }

    /// Picks the printed title and file path out of stdout.
    fn parse_printed(stdout: &str) -> (Option<String>, Option<PathBuf>) {
        let mut title = None;
        let mut path = None;
        for line in stdout.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix(TITLE_MARKER) {
                title = Some(value.to_string()).filter(|t| !t.is_empty() && t != "NA");
            } else if let Some(value) = line.strip_prefix(FILE_MARKER) {
                path = Some(PathBuf::from(value)).filter(|p| !p.as_os_str().is_empty());
            }
        }
        (title, path)
    }

    /// Locates the produced file: the printed path when it lies inside the
    /// sink, otherwise the single `media.*` file in the sink.
    async fn locate_output(sink: &EncodeSink, printed: Option<PathBuf>) -> Result<PathBuf, ExtractorError> {
        if let Some(path) = printed {
            if path.starts_with(sink.dir()) && tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
            warn!("yt-dlp reported {:?} outside the sink or missing", path);
        }

        let mut entries = tokio::fs::read_dir(sink.dir()).await?;
        let mut candidates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_output = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s == OUTPUT_STEM);
            let is_partial = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == "part" || e == "ytdl");
            if is_output && !is_partial {
                candidates.push(path);
            }
        }

        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => Err(ExtractorError::Decode("yt-dlp produced no output file".to_string())),
            n => Err(ExtractorError::Decode(format!(
                "yt-dlp produced {n} output files, expected one"
            ))),
        }
    }
}

/// Maps a failed run onto the error taxonomy using its stderr.
fn classify_failure(stderr: &str, phase: Phase) -> ExtractorError {
    let lower = stderr.to_lowercase();
    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .to_string();

    if UNSUPPORTED_MARKERS.iter().any(|m| lower.contains(m)) {
        ExtractorError::UnsupportedSource(message)
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        ExtractorError::Network(message)
    } else {
        match phase {
            Phase::Metadata => ExtractorError::ExtractionFailed(message),
            Phase::Download => ExtractorError::Decode(message),
        }
    }
}

fn record_call(operation: &str, start: Instant, result: &Result<impl Sized, ExtractorError>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    };
    metrics::EXTRACTOR_CALLS
        .with_label_values(&["yt_dlp", operation, status])
        .inc();
    metrics::EXTRACTOR_DURATION
        .with_label_values(&["yt_dlp", operation])
        .observe(start.elapsed().as_secs_f64());
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch_metadata(&self, url: &str) -> Result<MediaMetadata, ExtractorError> {
        let start = Instant::now();
        let result = async {
            let args = self.build_metadata_args(url);
            let output = self.run(&args, self.config.metadata_timeout_secs).await?;
            if !output.status.success() {
                return Err(classify_failure(
                    &String::from_utf8_lossy(&output.stderr),
                    Phase::Metadata,
                ));
            }
            Self::parse_metadata(&output.stdout)
        }
        .await;
        record_call("metadata", start, &result);
        result
    }

    async fn fetch_and_encode(
        &self,
        work: &WorkSpec,
        sink: &EncodeSink,
    ) -> Result<EncodedFile, ExtractorError> {
        let start = Instant::now();
        let result = async {
            let args = self.build_download_args(work, sink.dir());
            let output = self.run(&args, self.config.process_timeout_secs).await?;
            if !output.status.success() {
                return Err(classify_failure(
                    &String::from_utf8_lossy(&output.stderr),
                    Phase::Download,
                ));
            }

            let (title, printed) = Self::parse_printed(&String::from_utf8_lossy(&output.stdout));
            let path = Self::locate_output(sink, printed).await?;
            let bytes_written = tokio::fs::metadata(&path).await?.len();

            info!(
                "yt-dlp wrote {} bytes for {} ({})",
                bytes_written,
                work.source_url,
                work.encoding.descriptor()
            );

            Ok(EncodedFile {
                path,
                bytes_written,
                title,
            })
        }
        .await;
        record_call("encode", start, &result);
        result
    }

    async fn validate(&self) -> Result<(), ExtractorError> {
        let output = self.run(&["--version".to_string()], 30).await?;
        if !output.status.success() {
            return Err(ExtractorError::ExtractionFailed(
                "yt-dlp --version failed".to_string(),
            ));
        }
        info!(
            "Using yt-dlp {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}
