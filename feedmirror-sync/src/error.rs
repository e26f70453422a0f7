//! Error types for feedmirror-sync
//!
//! [`SyncError`] is the pipeline taxonomy; [`ApiError`] is what the HTTP shell
//! turns into a status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures of the session/feed pipeline
#[derive(Debug, Error)]
pub enum SyncError {
    /// Provider rejected the access token (401/403 class)
    #[error("Upstream rejected the access token")]
    Unauthorized,

    /// Refresh token invalid or expired; the session cannot be recovered
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Any other non-2xx upstream response
    #[error("Upstream error (status {status_code})")]
    Upstream { status_code: u16 },

    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// Feed payload in a shape the normalizer does not recognize
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Storage Layer failure during reconciliation or lookup
    #[error("Storage error: {0}")]
    Storage(#[from] feedmirror_common::Error),
}

impl SyncError {
    /// True when the session artifact must be invalidated (forced logout)
    pub fn requires_relogin(&self) -> bool {
        matches!(self, SyncError::Unauthorized | SyncError::RefreshFailed(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::MalformedPayload(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Session can no longer be used, client must log in again (401)
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Missing or invalid session artifact (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream provider answered with an error status
    #[error("Upstream error (status {0})")]
    Upstream(u16),

    /// Upstream unreachable or answered with garbage (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// feedmirror-common error
    #[error("Common error: {0}")]
    Common(#[from] feedmirror_common::Error),
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Unauthorized | SyncError::RefreshFailed(_) => {
                ApiError::SessionExpired(err.to_string())
            }
            SyncError::Upstream { status_code } => ApiError::Upstream(status_code),
            SyncError::Transport(msg) | SyncError::MalformedPayload(msg) => {
                ApiError::BadGateway(msg)
            }
            SyncError::Storage(e) => ApiError::Common(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::SessionExpired(msg) => (StatusCode::UNAUTHORIZED, "SESSION_EXPIRED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Upstream(code) => (
                StatusCode::from_u16(code)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                "UPSTREAM_ERROR",
                format!("Upstream responded with status {}", code),
            ),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "BAD_GATEWAY", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
