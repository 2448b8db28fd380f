//! Translation of core errors into HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use castloop_core::{CastloopError, LibraryError, SettingsError, StreamError};
use serde_json::json;

/// Error response with a `{"detail": ...}` body.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct ApiError {
    /// HTTP status to answer with
    pub status: StatusCode,
    /// Human readable reason
    pub detail: String,
}

impl ApiError {
    /// Builds an error with an explicit status.
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<CastloopError> for ApiError {
    fn from(error: CastloopError) -> Self {
        let status = match &error {
            CastloopError::Stream(StreamError::NotFound { .. })
            | CastloopError::Library(LibraryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            e if e.is_user_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", error);
        }

        Self::new(status, error.user_message())
    }
}

impl From<StreamError> for ApiError {
    fn from(error: StreamError) -> Self {
        CastloopError::from(error).into()
    }
}

impl From<LibraryError> for ApiError {
    fn from(error: LibraryError) -> Self {
        CastloopError::from(error).into()
    }
}

impl From<SettingsError> for ApiError {
    fn from(error: SettingsError) -> Self {
        CastloopError::from(error).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
