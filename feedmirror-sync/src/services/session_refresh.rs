//! Session Refresh Orchestrator
//!
//! Runs token-taking upstream operations under a two-state machine:
//!
//! ```text
//! Fresh ──(Unauthorized + refresh token + policy Once)──> Refreshed
//! ```
//!
//! The transition fires at most once per call. Any other failure is returned
//! untouched. Credentials go in and come back out (possibly rotated); nothing
//! about a session is held between calls.

use std::future::Future;
use std::sync::Arc;

use super::feed_normalizer::normalize;
use super::reconciler::{ReconcileReport, Reconciler};
use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::upstream::UpstreamApi;

/// Whether a call site may spend the refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Refresh once on `Unauthorized`, then retry the operation once
    Once,
    /// Never refresh; `Unauthorized` is returned as is
    Never,
}

/// Where the state machine ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Still on the caller-supplied access token
    Fresh,
    /// A refresh succeeded and the credentials carry the new access token
    Refreshed,
}

/// Result of an operation run under [`SessionRefresher::with_refresh`]
#[derive(Debug)]
pub struct Refreshing<T> {
    /// Best-known credentials: rotated when the refresh succeeded, even if the
    /// retried operation still failed
    pub credentials: Credentials,
    pub state: RefreshState,
    pub result: Result<T, SyncError>,
}

/// Reusable refresh-on-Unauthorized wrapper
#[derive(Clone)]
pub struct SessionRefresher {
    upstream: Arc<dyn UpstreamApi>,
}

impl SessionRefresher {
    pub fn new(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self { upstream }
    }

    /// Run `op` with the session's access token, refreshing per `policy`
    ///
    /// `op` receives the access token to use and may be invoked twice: once
    /// with the original token and, after a successful refresh, once with the
    /// new one.
    pub async fn with_refresh<T, F, Fut>(
        &self,
        credentials: Credentials,
        policy: RefreshPolicy,
        mut op: F,
    ) -> Refreshing<T>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let first = op(credentials.access_token.clone()).await;

        match first {
            Err(SyncError::Unauthorized) if policy == RefreshPolicy::Once => {}
            result => {
                return Refreshing {
                    credentials,
                    state: RefreshState::Fresh,
                    result,
                }
            }
        }

        let Some(refresh_token) = credentials.refresh_token.clone() else {
            tracing::warn!(
                user_id = %credentials.user_id,
                "Upstream rejected access token and no refresh token is available"
            );
            return Refreshing {
                credentials,
                state: RefreshState::Fresh,
                result: Err(SyncError::Unauthorized),
            };
        };

        tracing::warn!(user_id = %credentials.user_id, "Upstream rejected access token, refreshing");

        let refreshed = match self.upstream.refresh_access_token(&refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(user_id = %credentials.user_id, error = %e, "Access token refresh failed");
                return Refreshing {
                    credentials,
                    state: RefreshState::Fresh,
                    result: Err(e),
                };
            }
        };

        let credentials = credentials.with_access_token(refreshed.access_token);
        tracing::info!(user_id = %credentials.user_id, "Access token rotated");

        let result = op(credentials.access_token.clone()).await;
        if let Err(ref e) = result {
            tracing::warn!(
                user_id = %credentials.user_id,
                error = %e,
                "Upstream call failed again after refresh"
            );
        }

        Refreshing {
            credentials,
            state: RefreshState::Refreshed,
            result,
        }
    }
}

/// Outcome of one feed sync; the pipeline itself never fails
#[derive(Debug)]
pub struct SyncOutcome {
    pub credentials: Credentials,
    pub state: RefreshState,
    pub result: Result<ReconcileReport, SyncError>,
}

impl SyncOutcome {
    /// True when the session artifact must be invalidated
    pub fn requires_relogin(&self) -> bool {
        matches!(&self.result, Err(e) if e.requires_relogin())
    }

    pub fn is_rotated(&self) -> bool {
        self.state == RefreshState::Refreshed
    }
}

/// Fetch → normalize → reconcile, with credential refresh on the fetch
#[derive(Clone)]
pub struct FeedSync {
    upstream: Arc<dyn UpstreamApi>,
    refresher: SessionRefresher,
    reconciler: Reconciler,
}

impl FeedSync {
    pub fn new(upstream: Arc<dyn UpstreamApi>, reconciler: Reconciler) -> Self {
        Self {
            refresher: SessionRefresher::new(Arc::clone(&upstream)),
            upstream,
            reconciler,
        }
    }

    pub fn refresher(&self) -> &SessionRefresher {
        &self.refresher
    }

    /// Sync the session owner's friend feed into storage
    ///
    /// Failures are reported in the outcome, never as `Err`: a failed sync
    /// skips reconciliation and leaves the session usable unless the outcome
    /// says otherwise.
    pub async fn sync_feed(&self, credentials: Credentials, policy: RefreshPolicy) -> SyncOutcome {
        let upstream = Arc::clone(&self.upstream);
        let fetched = self
            .refresher
            .with_refresh(credentials, policy, move |token| {
                let upstream = Arc::clone(&upstream);
                async move { upstream.fetch_feed(&token).await }
            })
            .await;

        let Refreshing {
            credentials,
            state,
            result,
        } = fetched;

        let result = match result {
            Ok(payload) => self.normalize_and_reconcile(&payload, &credentials.user_id).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            tracing::warn!(
                user_id = %credentials.user_id,
                error = %e,
                relogin = e.requires_relogin(),
                "Feed sync skipped"
            );
        }

        SyncOutcome {
            credentials,
            state,
            result,
        }
    }

    async fn normalize_and_reconcile(
        &self,
        payload: &crate::upstream::FeedPayload,
        user_id: &str,
    ) -> Result<ReconcileReport, SyncError> {
        let feed = normalize(payload)?;

        if !feed.skipped.is_empty() {
            tracing::warn!(
                user_id,
                skipped = feed.skipped.len(),
                first = %feed.skipped[0],
                "Feed contained unusable posts"
            );
        }

        Ok(self.reconciler.reconcile(&feed.posts, user_id).await?)
    }
}
