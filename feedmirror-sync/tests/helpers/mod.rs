//! Test Helper Utilities
//!
//! Shared utilities for testing feedmirror-sync
#![allow(dead_code)]

pub mod db_utils;
pub mod stub_upstream;

pub use db_utils::{create_test_db, feed_post, seed_owner};
pub use stub_upstream::{Reply, StubUpstream};
