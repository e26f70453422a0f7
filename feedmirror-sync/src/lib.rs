//! feedmirror-sync library interface
//!
//! Session/credential lifecycle and feed reconciliation for a social-feed
//! provider, plus the thin HTTP shell in front of it. Exposed as a library so
//! the integration tests can drive the pipeline with stub upstreams.

pub mod api;
pub mod credentials;
pub mod db;
pub mod error;
pub mod services;
pub mod upstream;
pub mod utils;

pub use crate::credentials::Credentials;
pub use crate::error::{ApiError, ApiResult, SyncError};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::SessionCodec;
use crate::services::{FeedSync, Reconciler};
use crate::upstream::UpstreamApi;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub upstream: Arc<dyn UpstreamApi>,
    pub reconciler: Reconciler,
    pub feed_sync: FeedSync,
    /// Session cookie signing and rendering
    pub sessions: SessionCodec,
    /// Expected `x-api-key`; `None` refuses every API request
    pub api_key: Option<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        upstream: Arc<dyn UpstreamApi>,
        sessions: SessionCodec,
        api_key: Option<String>,
        max_lock_wait_ms: u64,
    ) -> Self {
        let reconciler = Reconciler::new(db.clone(), max_lock_wait_ms);
        let feed_sync = FeedSync::new(Arc::clone(&upstream), reconciler.clone());

        Self {
            db,
            upstream,
            reconciler,
            feed_sync,
            sessions,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `/health` is public; everything under `/api/v1` sits behind the API key.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/api/v1/login", post(api::login))
        .route("/api/v1/logout", post(api::logout))
        .route("/api/v1/feed", get(api::get_feed))
        .route("/api/v1/user/:username", get(api::get_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::api_key_middleware,
        ));

    Router::new()
        .merge(protected)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
