//! Upstream Client
//!
//! The four remote operations the pipeline needs from the feed provider. All of
//! them only cross the process boundary; none touches local state.

pub mod client;

pub use client::HttpUpstream;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Raw provider feed body, handed to the normalizer untouched
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPayload(pub serde_json::Value);

/// Result of exchanging a refresh token
#[derive(Debug, Clone)]
pub struct RefreshedToken {
    pub access_token: String,
    pub id_token: Option<String>,
}

/// Provider picture reference (`{"url": ...}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: Option<String>,
}

/// Session owner's own profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<MediaRef>,
}

impl Profile {
    pub fn profile_picture_url(&self) -> Option<String> {
        self.profile_picture.as_ref().and_then(|p| p.url.clone())
    }
}

/// Entry of the provider's friend list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<MediaRef>,
}

impl Friend {
    pub fn profile_picture_url(&self) -> Option<String> {
        self.profile_picture.as_ref().and_then(|p| p.url.clone())
    }
}

/// Remote operations against the feed provider
///
/// Implemented over HTTP by [`HttpUpstream`]; tests drive the pipeline with
/// scripted implementations.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Fetch the friend feed
    ///
    /// # Errors
    /// `Unauthorized` on 401/403, `Upstream` on other non-2xx, `Transport` on
    /// network failure or timeout.
    async fn fetch_feed(&self, access_token: &str) -> Result<FeedPayload, SyncError>;

    /// Exchange a refresh token for a new access token
    ///
    /// # Errors
    /// `RefreshFailed` when either exchange step rejects.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError>;

    /// Fetch the session owner's profile
    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, SyncError>;

    /// Fetch the session owner's friend list
    async fn fetch_friends(&self, access_token: &str) -> Result<Vec<Friend>, SyncError>;
}
