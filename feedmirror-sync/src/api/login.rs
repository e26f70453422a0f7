//! Login and logout

use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::Session;
use super::session::UserInfo;
use crate::credentials::Credentials;
use crate::error::{ApiError, ApiResult};
use crate::services::{spawn_friend_enrichment, RefreshPolicy};
use crate::AppState;

/// POST /api/v1/login request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: String,
    pub username: String,
    pub profile_picture: Option<String>,
}

/// POST /api/v1/login
///
/// Takes provider tokens already minted by the client, resolves the owner's
/// profile, seeds the owner row and starts friend enrichment in the
/// background. Answers with both session cookies set.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    if request.access_token.trim().is_empty() {
        return Err(ApiError::BadRequest("accessToken is required".to_string()));
    }

    let refresh_token = request.refresh_token.filter(|t| !t.trim().is_empty());
    let credentials = Credentials::new(String::new(), request.access_token, refresh_token);

    let upstream = Arc::clone(&state.upstream);
    let fetched = state
        .feed_sync
        .refresher()
        .with_refresh(credentials, RefreshPolicy::Once, move |token| {
            let upstream = Arc::clone(&upstream);
            async move { upstream.fetch_profile(&token).await }
        })
        .await;

    let profile = match fetched.result {
        Ok(profile) => profile,
        Err(e) if e.requires_relogin() => return state.sessions.forced_logout(e.into()),
        Err(e) => return Err(e.into()),
    };
    let credentials = Credentials {
        user_id: profile.id.clone(),
        ..fetched.credentials
    };

    state.reconciler.seed_login(&profile, &[]).await?;

    spawn_friend_enrichment(
        state.upstream.clone(),
        state.reconciler.clone(),
        credentials.clone(),
    );

    let info = UserInfo {
        username: profile.username.clone(),
        profile_picture: profile.profile_picture_url(),
        logged_in_at: Utc::now().timestamp_millis(),
    };

    let cookies = AppendHeaders([
        (SET_COOKIE, state.sessions.auth_cookie(&credentials)?),
        (SET_COOKIE, state.sessions.user_info_cookie(&info)?),
    ]);

    tracing::info!(user_id = %credentials.user_id, "User logged in");

    Ok((
        cookies,
        Json(LoginResponse {
            user_id: profile.id,
            username: info.username,
            profile_picture: info.profile_picture,
        }),
    )
        .into_response())
}

/// POST /api/v1/logout
pub async fn logout(
    State(state): State<AppState>,
    Session(credentials): Session,
) -> ApiResult<impl IntoResponse> {
    let [auth, info] = state.sessions.clear_cookies()?;

    tracing::info!(user_id = %credentials.user_id, "User logged out");

    Ok((
        AppendHeaders([(SET_COOKIE, auth), (SET_COOKIE, info)]),
        Json(serde_json::Value::Null),
    ))
}
