//! Request gates
//!
//! - [`api_key_middleware`]: every `/api/v1` route requires `x-api-key`. A
//!   mismatch answers 404 with an empty body so the API is not discoverable.
//!   With no key configured every request is refused.
//! - [`Session`]: extractor that decodes the signed session cookie into
//!   [`Credentials`], rejecting with 403 before a handler runs.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::session::{read_cookie, AUTH_COOKIE};
use crate::credentials::Credentials;
use crate::error::ApiError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// API key gate
pub async fn api_key_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    let authorized = matches!(
        (state.api_key.as_deref(), provided),
        (Some(expected), Some(provided)) if expected == provided
    );

    if authorized {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "Rejected request without valid API key");
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Authenticated session of the caller
#[derive(Debug, Clone)]
pub struct Session(pub Credentials);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let value = read_cookie(&parts.headers, AUTH_COOKIE)
            .ok_or_else(|| ApiError::Forbidden("no session".to_string()))?;

        state
            .sessions
            .decode(value)
            .map(Session)
            .ok_or_else(|| ApiError::Forbidden("invalid session".to_string()))
    }
}
