//! Metadata lookup and download submission.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use reelfetch_core::identity::normalize_source_url;
use reelfetch_core::{
    resolve, ArtifactRef, FormatRequest, JobKey, JobState, MediaKind, MediaMetadata, Orchestrator,
    WaitError, WaiterHandle,
};

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Canonical source URL the metadata was fetched for.
    pub url: String,
    #[serde(flatten)]
    pub metadata: MediaMetadata,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: MediaKind,
    #[serde(default)]
    pub format_id: Option<String>,
    /// Block until the artifact is ready (bounded by `wait_timeout_secs`).
    #[serde(default)]
    pub wait: bool,
}

fn default_kind() -> MediaKind {
    MediaKind::Video
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub key: JobKey,
    pub state: JobState,
    pub status_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Human readable file name, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
}

impl DownloadResponse {
    fn pending(key: JobKey, state: JobState) -> Self {
        Self {
            status_url: status_url(&key),
            key,
            state,
            download_url: None,
            filename: None,
            size: None,
            artifact: None,
        }
    }

    fn completed(key: JobKey, artifact: ArtifactRef) -> Self {
        Self {
            status_url: status_url(&key),
            key,
            state: JobState::Completed,
            download_url: Some(download_url(&artifact)),
            filename: Some(artifact.display_name.clone()),
            size: Some(artifact.size_bytes),
            artifact: Some(artifact),
        }
    }
}

pub fn status_url(key: &JobKey) -> String {
    format!("/api/v1/jobs/{}", key)
}

pub fn download_url(artifact: &ArtifactRef) -> String {
    format!("/downloads/{}", artifact.handle)
}

// ============================================================================
// Handlers
// ============================================================================

/// Look up title, author, duration and muxed encodings for a source.
pub async fn get_info(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InfoRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    let url = normalize_source_url(&body.url)?;
    debug!(url = %url, "Fetching metadata");
    let metadata = state.extractor().fetch_metadata(&url).await?;
    Ok(Json(InfoResponse { url, metadata }))
}

/// Resolve and submit a download; optionally wait for the artifact.
pub async fn request_download(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<DownloadResponse>), ApiError> {
    let request = FormatRequest {
        kind: body.kind,
        format_id: body.format_id,
    };
    let resolved = resolve(&body.url, &request)?;
    let orchestrator = state.orchestrator();
    let handle = orchestrator.submit(resolved.key.clone(), resolved.work)?;

    info!(
        key = %resolved.key,
        created = handle.created_job(),
        wait = body.wait,
        "Download requested"
    );

    if body.wait {
        let timeout = Duration::from_secs(orchestrator.config().wait_timeout_secs);
        match orchestrator.wait(&handle, timeout).await {
            Ok(artifact) => {
                return Ok((
                    StatusCode::OK,
                    Json(DownloadResponse::completed(resolved.key, artifact)),
                ))
            }
            Err(WaitError::Failed(info)) => return Err(info.into()),
            Err(WaitError::Timeout) => {}
        }
    }

    match handle.outcome() {
        Some(Ok(artifact)) => Ok((
            StatusCode::OK,
            Json(DownloadResponse::completed(resolved.key, artifact)),
        )),
        Some(Err(info)) => Err(info.into()),
        None => {
            let job_state = orchestrator
                .status(&resolved.key)
                .map(|view| view.state)
                .unwrap_or(JobState::Pending);
            keep_interest(
                Arc::clone(orchestrator),
                handle,
                orchestrator.config().request_interest_secs,
            );
            Ok((
                StatusCode::ACCEPTED,
                Json(DownloadResponse::pending(resolved.key, job_state)),
            ))
        }
    }
}

/// Hold the registration after the response is sent so the job is not
/// cancelled for lack of requesters while the client polls.
fn keep_interest(orchestrator: Arc<Orchestrator>, handle: WaiterHandle, secs: u64) {
    tokio::spawn(async move {
        let _ = orchestrator.wait(&handle, Duration::from_secs(secs)).await;
        drop(handle);
    });
}
