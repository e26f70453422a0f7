//! Credential Store
//!
//! The per-session token triple. It has no lifecycle of its own: it is decoded
//! from the inbound session artifact, threaded through the pipeline by value,
//! and handed back (possibly rotated) for the shell to re-encode.

use serde::{Deserialize, Serialize};

/// Tokens for one session owner
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub user_id: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(
        user_id: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Copy of these credentials carrying a freshly minted access token
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            user_id: self.user_id.clone(),
            access_token: access_token.into(),
            refresh_token: self.refresh_token.clone(),
        }
    }

    /// Copy without the refresh token, for paths that must never refresh
    pub fn without_refresh_token(&self) -> Self {
        Self {
            user_id: self.user_id.clone(),
            access_token: self.access_token.clone(),
            refresh_token: None,
        }
    }
}

// Tokens stay out of logs
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
