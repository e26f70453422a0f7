//! Session Refresh Orchestrator Integration Tests
//!
//! Drives `FeedSync` with a scripted upstream and checks the refresh state
//! machine, credential rotation and fail-soft behaviour.

mod helpers;

use std::sync::Arc;

use feedmirror_sync::db::{photos, relationships};
use feedmirror_sync::error::SyncError;
use feedmirror_sync::services::{
    spawn_friend_enrichment, FeedSync, RefreshPolicy, RefreshState, Reconciler, SessionRefresher,
};
use feedmirror_sync::upstream::UpstreamApi;
use feedmirror_sync::Credentials;
use helpers::stub_upstream::{friend, grouped_feed, profile};
use helpers::{create_test_db, seed_owner, Reply, StubUpstream};
use serde_json::json;

fn session() -> Credentials {
    Credentials::new("u0", "stale-token", Some("refresh-token".to_string()))
}

#[tokio::test]
async fn test_fresh_token_no_refresh() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(StubUpstream::new().with_feed(vec![Reply::Ok(grouped_feed(&[(
        "p1", "u1", "alice", "a",
    )]))]));
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

    assert_eq!(outcome.state, RefreshState::Fresh);
    assert_eq!(outcome.credentials.access_token, "stale-token");
    assert_eq!(outcome.result.unwrap().posts, 1);
    assert_eq!(stub.feed.calls(), 1);
    assert_eq!(stub.refresh.calls(), 0);
}

#[tokio::test]
async fn test_refresh_once_then_succeed() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(
        StubUpstream::new()
            .with_feed(vec![
                Reply::Unauthorized,
                Reply::Ok(grouped_feed(&[("p1", "u1", "alice", "a")])),
            ])
            .with_refresh(vec![Reply::Ok("new-token".to_string())]),
    );
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

    assert_eq!(stub.feed.calls(), 2);
    assert_eq!(stub.refresh.calls(), 1);
    assert_eq!(stub.feed_tokens(), vec!["stale-token", "new-token"]);

    assert!(outcome.is_rotated());
    assert_eq!(outcome.credentials.access_token, "new-token");
    assert_eq!(outcome.credentials.refresh_token.as_deref(), Some("refresh-token"));
    assert!(outcome.result.is_ok());
    assert_eq!(photos::count_photos(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn test_refresh_failure_is_fail_soft() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(
        StubUpstream::new()
            .with_feed(vec![Reply::Unauthorized])
            .with_refresh(vec![Reply::RefreshFailed]),
    );
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

    assert_eq!(stub.feed.calls(), 1);
    assert_eq!(stub.refresh.calls(), 1);
    assert_eq!(outcome.state, RefreshState::Fresh);
    assert_eq!(outcome.credentials.access_token, "stale-token");
    assert!(matches!(outcome.result, Err(SyncError::RefreshFailed(_))));
    assert!(outcome.requires_relogin());

    // reconciliation never ran: not even the self-loop was written
    assert_eq!(relationships::count_edges(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_retry_still_unauthorized_keeps_new_token() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(
        StubUpstream::new()
            .with_feed(vec![Reply::Unauthorized])
            .with_refresh(vec![Reply::Ok("new-token".to_string())]),
    );
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

    // exactly one refresh, no second one after the retried fetch fails
    assert_eq!(stub.feed.calls(), 2);
    assert_eq!(stub.refresh.calls(), 1);
    assert_eq!(outcome.state, RefreshState::Refreshed);
    assert_eq!(outcome.credentials.access_token, "new-token");
    assert!(matches!(outcome.result, Err(SyncError::Unauthorized)));
}

#[tokio::test]
async fn test_no_refresh_token_available() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(StubUpstream::new().with_feed(vec![Reply::Unauthorized]));
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let credentials = Credentials::new("u0", "stale-token", None);
    let outcome = sync.sync_feed(credentials, RefreshPolicy::Once).await;

    assert_eq!(stub.refresh.calls(), 0);
    assert_eq!(stub.feed.calls(), 1);
    assert!(outcome.requires_relogin());
}

#[tokio::test]
async fn test_never_policy_does_not_refresh() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(
        StubUpstream::new()
            .with_feed(vec![Reply::Unauthorized])
            .with_refresh(vec![Reply::Ok("new-token".to_string())]),
    );
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Never).await;

    assert_eq!(stub.refresh.calls(), 0);
    assert_eq!(outcome.credentials.access_token, "stale-token");
    assert!(matches!(outcome.result, Err(SyncError::Unauthorized)));
}

#[tokio::test]
async fn test_non_auth_errors_not_retried() {
    for reply in [Reply::Status(500), Reply::Transport] {
        let (_dir, pool) = create_test_db().await;
        seed_owner(&pool, "u0", "me").await;
        let stub = Arc::new(
            StubUpstream::new()
                .with_feed(vec![reply])
                .with_refresh(vec![Reply::Ok("new-token".to_string())]),
        );
        let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

        let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

        assert_eq!(stub.feed.calls(), 1);
        assert_eq!(stub.refresh.calls(), 0);
        assert!(outcome.result.is_err());
        assert!(!outcome.requires_relogin());
    }
}

#[tokio::test]
async fn test_malformed_payload_skips_reconcile() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let stub = Arc::new(StubUpstream::new().with_feed(vec![Reply::Ok(json!({"unexpected": true}))]));
    let sync = FeedSync::new(stub.clone(), Reconciler::new(pool.clone(), 5000));

    let outcome = sync.sync_feed(session(), RefreshPolicy::Once).await;

    assert!(matches!(outcome.result, Err(SyncError::MalformedPayload(_))));
    assert!(!outcome.requires_relogin());
    assert_eq!(relationships::count_edges(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_with_refresh_is_reusable_for_other_calls() {
    let stub = Arc::new(
        StubUpstream::new()
            .with_profile(vec![Reply::Unauthorized, Reply::Ok(profile("u0", "me"))])
            .with_refresh(vec![Reply::Ok("new-token".to_string())]),
    );
    let refresher = SessionRefresher::new(stub.clone());

    let upstream = stub.clone();
    let fetched = refresher
        .with_refresh(session(), RefreshPolicy::Once, |token| {
            let upstream = upstream.clone();
            async move { upstream.fetch_profile(&token).await }
        })
        .await;

    assert_eq!(fetched.state, RefreshState::Refreshed);
    assert_eq!(fetched.result.unwrap().username, "me");
    assert_eq!(stub.profile.calls(), 2);
}

#[tokio::test]
async fn test_friend_enrichment_errors_stay_in_task() {
    let (_dir, pool) = create_test_db().await;
    seed_owner(&pool, "u0", "me").await;
    let reconciler = Reconciler::new(pool.clone(), 5000);

    let ok_stub = Arc::new(
        StubUpstream::new().with_friends(vec![Reply::Ok(vec![friend("u1", "alice"), friend("u2", "bob")])]),
    );
    let written = spawn_friend_enrichment(ok_stub, reconciler.clone(), session())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(relationships::count_edge(&pool, "u0", "u2").await.unwrap(), 1);

    let failing_stub = Arc::new(StubUpstream::new().with_friends(vec![Reply::Status(503)]));
    let result = spawn_friend_enrichment(failing_stub, reconciler, session())
        .await
        .unwrap();
    assert!(matches!(result, Err(SyncError::Upstream { status_code: 503 })));
}
