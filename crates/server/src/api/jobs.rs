//! Job status and long-poll handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use reelfetch_core::{JobKey, JobView};

use super::error::ApiError;
use super::media::download_url;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobResponse {
    #[serde(flatten)]
    pub view: JobView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<JobView> for JobResponse {
    fn from(view: JobView) -> Self {
        Self {
            download_url: view.artifact.as_ref().map(download_url),
            view,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WaitParams {
    /// Capped at the configured `wait_timeout_secs`.
    pub timeout_secs: Option<u64>,
}

/// Snapshot of the job recorded for a key.
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let key = JobKey::parse(&key)?;
    let view = state
        .orchestrator()
        .status(&key)
        .ok_or_else(|| ApiError::not_found(format!("job not found: {}", key)))?;
    Ok(Json(view.into()))
}

/// Long-poll until the job settles or the timeout elapses.
///
/// Returns 200 with the terminal view, or 202 with the current view when the
/// wait ran out.
pub async fn wait_job(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<WaitParams>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let key = JobKey::parse(&key)?;
    let orchestrator = state.orchestrator();
    let handle = orchestrator
        .attach(&key)
        .ok_or_else(|| ApiError::not_found(format!("job not found: {}", key)))?;

    let max = orchestrator.config().wait_timeout_secs;
    let timeout = params.timeout_secs.unwrap_or(max).min(max);
    // Failures are reported through the view.
    let _ = orchestrator
        .wait(&handle, Duration::from_secs(timeout))
        .await;

    let view = orchestrator
        .status(&key)
        .ok_or_else(|| ApiError::not_found(format!("job not found: {}", key)))?;
    drop(handle);

    let status = if view.state.is_terminal() {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((status, Json(view.into())))
}
