//! Pipeline services: normalize, reconcile, refresh, enrich

pub mod enrichment;
pub mod feed_normalizer;
pub mod reconciler;
pub mod session_refresh;

pub use enrichment::spawn_friend_enrichment;
pub use feed_normalizer::{normalize, FeedSchema, NormalizedFeed, NormalizedPost, UserStub};
pub use reconciler::{ReconcileReport, Reconciler};
pub use session_refresh::{
    FeedSync, RefreshPolicy, RefreshState, Refreshing, SessionRefresher, SyncOutcome,
};
