//! Feed endpoints

use axum::{
    extract::{Path, State},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};

use super::auth::Session;
use crate::db::{query_feed, query_feed_for_user, FeedEntry};
use crate::error::{ApiError, ApiResult};
use crate::services::{RefreshPolicy, SyncOutcome};
use crate::AppState;

/// GET /api/v1/feed
///
/// Syncs the provider feed, then answers from local storage. A sync that
/// failed without invalidating the session still answers with what is
/// stored; one that invalidated it clears both cookies and answers 401.
pub async fn get_feed(
    State(state): State<AppState>,
    Session(credentials): Session,
) -> ApiResult<Response> {
    let SyncOutcome {
        credentials,
        result,
        ..
    } = state.feed_sync.sync_feed(credentials, RefreshPolicy::Once).await;

    match result {
        Err(e) if e.requires_relogin() => {
            tracing::info!(user_id = %credentials.user_id, "Session invalidated, forcing logout");
            return state.sessions.forced_logout(e.into());
        }
        Err(_) => {
            tracing::info!(user_id = %credentials.user_id, "Serving stored feed after failed sync");
        }
        Ok(_) => {}
    }

    let cookie = state.sessions.auth_cookie(&credentials)?;
    let feed = query_feed(&state.db, &credentials.user_id).await?;

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(feed)).into_response())
}

/// GET /api/v1/user/:username
///
/// Best-effort sync that never spends the refresh token, then the stored
/// entry for one followed user.
pub async fn get_user(
    State(state): State<AppState>,
    Session(credentials): Session,
    Path(username): Path<String>,
) -> ApiResult<Json<FeedEntry>> {
    let user_id = credentials.user_id.clone();

    let outcome = state
        .feed_sync
        .sync_feed(credentials.without_refresh_token(), RefreshPolicy::Never)
        .await;
    if let Err(e) = &outcome.result {
        tracing::debug!(user_id = %user_id, error = %e, "Lookup sync did not complete");
    }

    query_feed_for_user(&state.db, &user_id, &username)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("user {}", username)))
}
