//! Background friend enrichment
//!
//! Login answers as soon as the owner is seeded; the friend list is pulled and
//! written in a spawned task whose failures are logged and go nowhere else.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::reconciler::Reconciler;
use crate::credentials::Credentials;
use crate::error::SyncError;
use crate::upstream::UpstreamApi;

/// Spawn friend-list population for `credentials.user_id`
///
/// Resolves to the number of friends written. The owner row must already
/// exist (see [`Reconciler::seed_login`]).
pub fn spawn_friend_enrichment(
    upstream: Arc<dyn UpstreamApi>,
    reconciler: Reconciler,
    credentials: Credentials,
) -> JoinHandle<Result<usize, SyncError>> {
    tokio::spawn(async move {
        let result = enrich(upstream.as_ref(), &reconciler, &credentials).await;

        match &result {
            Ok(count) => {
                tracing::info!(user_id = %credentials.user_id, friends = count, "Friend enrichment complete")
            }
            Err(e) => {
                tracing::error!(user_id = %credentials.user_id, error = %e, "Friend enrichment failed")
            }
        }

        result
    })
}

async fn enrich(
    upstream: &dyn UpstreamApi,
    reconciler: &Reconciler,
    credentials: &Credentials,
) -> Result<usize, SyncError> {
    let friends = upstream.fetch_friends(&credentials.access_token).await?;
    let report = reconciler.seed_friends(&credentials.user_id, &friends).await?;
    Ok(report.users)
}
