//! Streaming of published artifacts.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::error::ApiError;
use crate::state::AppState;

/// Stream an artifact as an attachment.
pub async fn download_artifact(
    State(state): State<Arc<AppState>>,
    Path(handle): Path<String>,
) -> Result<Response, ApiError> {
    let reader = state.store().open_reader(&handle).await?;
    let artifact = reader.artifact().clone();
    debug!(
        handle = %artifact.handle,
        size = artifact.size_bytes,
        "Serving artifact"
    );

    let body = Body::from_stream(ReaderStream::new(reader));
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static(artifact.content_type()),
        ),
        (
            header::CONTENT_LENGTH,
            HeaderValue::from(artifact.size_bytes),
        ),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&artifact.display_name),
        ),
    ];
    Ok((headers, body).into_response())
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(name: &str) -> HeaderValue {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
