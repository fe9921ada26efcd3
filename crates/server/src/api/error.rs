//! Mapping from core failures to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use reelfetch_core::{ErrorInfo, ErrorKind, ExtractorError, IdentityError, StoreError, SubmitError};

/// Error body returned by every API endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

/// A failure that is rendered as `(status, ErrorResponse)`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: status_for(kind),
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::UnsupportedSource => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ExtractionFailed | ErrorKind::NetworkError => StatusCode::BAD_GATEWAY,
        ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Cancelled => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind,
            }),
        )
            .into_response()
    }
}

impl From<ErrorInfo> for ApiError {
    fn from(info: ErrorInfo) -> Self {
        Self::new(info.kind, info.message)
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(e: SubmitError) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<ExtractorError> for ApiError {
    fn from(e: ExtractorError) -> Self {
        if matches!(e, ExtractorError::BinaryNotFound { .. } | ExtractorError::Io(_)) {
            tracing::error!("Extractor unavailable: {}", e);
            return Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                kind: e.kind(),
                message: e.to_string(),
            };
        }
        Self::new(e.kind(), e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::not_found(e.to_string()),
            _ => Self::new(e.kind(), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::new(ErrorKind::InvalidInput, "x").status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::new(ErrorKind::Overloaded, "x").status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::new(ErrorKind::NetworkError, "x").status,
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::new(ErrorKind::Cancelled, "x").status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_store_not_found_is_404() {
        let err: ApiError = StoreError::NotFound("abc".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err: ApiError = StoreError::InvalidHandle("../x".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_binary_is_500() {
        let err: ApiError = ExtractorError::BinaryNotFound {
            path: "/nope/yt-dlp".into(),
        }
        .into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind, ErrorKind::ExtractionFailed);
    }
}
