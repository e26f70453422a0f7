//! Storage Layer repositories
//!
//! Write operations take a `&mut SqliteConnection` so the Reconciliation Engine
//! can run them inside one transaction; read operations take the pool.

pub mod feed;
pub mod photos;
pub mod relationships;
pub mod users;

pub use feed::{query_feed, query_feed_for_user, FeedEntry, FeedPhoto};
