//! HTTP implementation of [`UpstreamApi`]
//!
//! Every call is bearer-authenticated, bounded by the configured timeout and
//! throttled by one process-wide rate limiter.

use async_trait::async_trait;
use feedmirror_common::config::ProviderConfig;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::num::NonZeroU32;
use std::time::Duration;

use super::{FeedPayload, Friend, Profile, RefreshedToken, UpstreamApi};
use crate::error::SyncError;

const USER_AGENT: &str = concat!("feedmirror/", env!("CARGO_PKG_VERSION"));

/// Identity-token mint response (step 1 of refresh)
#[derive(Debug, Deserialize)]
struct SecureTokenResponse {
    id_token: Option<String>,
    access_token: Option<String>,
}

/// Federated exchange response (step 2 of refresh)
#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FriendsEnvelope {
    #[serde(default)]
    data: Vec<Friend>,
}

/// Feed provider client
pub struct HttpUpstream {
    http_client: reqwest::Client,
    rate_limiter: DefaultDirectRateLimiter,
    config: ProviderConfig,
}

impl HttpUpstream {
    pub fn new(config: ProviderConfig) -> Result<Self, SyncError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            config,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        access_token: &str,
    ) -> Result<T, SyncError> {
        self.rate_limiter.until_ready().await;

        let url = self.api_url(path);
        tracing::debug!(url = %url, "Querying upstream API");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = check_status(response)?;
        Ok(response.json::<T>().await?)
    }

    /// Step 1: mint a provider identity token from the refresh token
    async fn mint_identity_token(&self, refresh_token: &str) -> Result<String, SyncError> {
        self.rate_limiter.until_ready().await;

        let mut request = self.http_client.post(&self.config.secure_token_url).json(&json!({
            "grantType": "refresh_token",
            "refreshToken": refresh_token,
        }));
        if let Some(key) = self.config.api_key.as_deref() {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RefreshFailed(format!(
                "identity token mint rejected with status {}",
                status.as_u16()
            )));
        }

        let body: SecureTokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RefreshFailed(format!("unreadable mint response: {}", e)))?;

        body.id_token
            .or(body.access_token)
            .ok_or_else(|| SyncError::RefreshFailed("mint response carried no token".to_string()))
    }

    /// Step 2: exchange the identity token for a provider access token
    async fn exchange_identity_token(&self, id_token: &str) -> Result<String, SyncError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .post(&self.config.token_exchange_url)
            .json(&json!({
                "grant_type": "firebase",
                "client_id": self.config.client_id.as_deref().unwrap_or_default(),
                "client_secret": self.config.client_secret.as_deref().unwrap_or_default(),
                "token": id_token,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::RefreshFailed(format!(
                "token exchange rejected with status {}",
                status.as_u16()
            )));
        }

        let body: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| SyncError::RefreshFailed(format!("unreadable exchange response: {}", e)))?;

        body.access_token
            .ok_or_else(|| SyncError::RefreshFailed("exchange response carried no token".to_string()))
    }
}

/// Map provider status codes onto the pipeline taxonomy
fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SyncError::Unauthorized);
    }

    if !status.is_success() {
        return Err(SyncError::Upstream {
            status_code: status.as_u16(),
        });
    }

    Ok(response)
}

#[async_trait]
impl UpstreamApi for HttpUpstream {
    async fn fetch_feed(&self, access_token: &str) -> Result<FeedPayload, SyncError> {
        let body: serde_json::Value = self.get_json(&self.config.feed_path, access_token).await?;
        Ok(FeedPayload(body))
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<RefreshedToken, SyncError> {
        let id_token = self.mint_identity_token(refresh_token).await?;
        let access_token = self.exchange_identity_token(&id_token).await?;

        tracing::debug!("Upstream access token refreshed");

        Ok(RefreshedToken {
            access_token,
            id_token: Some(id_token),
        })
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<Profile, SyncError> {
        self.get_json("/person/me", access_token).await
    }

    async fn fetch_friends(&self, access_token: &str) -> Result<Vec<Friend>, SyncError> {
        let envelope: FriendsEnvelope = self.get_json("/relationships/friends", access_token).await?;
        Ok(envelope.data)
    }
}
