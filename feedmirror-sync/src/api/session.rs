//! Session artifact codec
//!
//! Credentials travel with the client in a signed, HttpOnly cookie:
//! `base64url(json) "." base64url(HMAC-SHA256(secret, base64url(json)))`.
//! A second, unsigned cookie carries display data for the frontend.

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{AppendHeaders, IntoResponse, Response};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use feedmirror_common::config::SessionConfig;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::credentials::Credentials;
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

pub const AUTH_COOKIE: &str = "feedmirror-auth";
pub const USER_INFO_COOKIE: &str = "feedmirror-user-info";

/// Display data for the frontend, readable by scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    pub profile_picture: Option<String>,
    /// Unix milliseconds
    pub logged_in_at: i64,
}

/// Signs, verifies and renders the session cookies
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    domain: Option<String>,
    secure: bool,
}

impl SessionCodec {
    pub fn new(config: &SessionConfig) -> feedmirror_common::Result<Self> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| feedmirror_common::Error::Config("session secret missing".to_string()))?;

        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| feedmirror_common::Error::Config(format!("session secret: {}", e)))?;

        Ok(Self {
            mac,
            domain: config.domain.clone(),
            secure: config.secure,
        })
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Signed cookie value for `credentials`
    pub fn encode(&self, credentials: &Credentials) -> Result<String, ApiError> {
        let json = serde_json::to_vec(credentials)
            .map_err(|e| ApiError::Internal(format!("encode session: {}", e)))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(&payload));
        Ok(format!("{}.{}", payload, signature))
    }

    /// Verify and decode a cookie value
    ///
    /// `None` for anything unsigned, tampered with, or missing the user id or
    /// access token.
    pub fn decode(&self, value: &str) -> Option<Credentials> {
        let (payload, signature) = value.split_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).ok()?;

        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let credentials: Credentials = serde_json::from_slice(&json).ok()?;

        if credentials.user_id.is_empty() || credentials.access_token.is_empty() {
            return None;
        }
        Some(credentials)
    }

    /// `Set-Cookie` value carrying `credentials`
    pub fn auth_cookie(&self, credentials: &Credentials) -> Result<HeaderValue, ApiError> {
        let value = self.encode(credentials)?;
        self.render(AUTH_COOKIE, &value, true, None)
    }

    /// `Set-Cookie` value carrying `info` (base64url JSON, not HttpOnly)
    pub fn user_info_cookie(&self, info: &UserInfo) -> Result<HeaderValue, ApiError> {
        let json = serde_json::to_vec(info)
            .map_err(|e| ApiError::Internal(format!("encode user info: {}", e)))?;
        self.render(USER_INFO_COOKIE, &URL_SAFE_NO_PAD.encode(json), false, None)
    }

    /// `Set-Cookie` values expiring both session cookies
    pub fn clear_cookies(&self) -> Result<[HeaderValue; 2], ApiError> {
        Ok([
            self.render(AUTH_COOKIE, "", true, Some(0))?,
            self.render(USER_INFO_COOKIE, "", false, Some(0))?,
        ])
    }

    /// Error response that also expires both session cookies
    pub fn forced_logout(&self, error: ApiError) -> Result<Response, ApiError> {
        let [auth, info] = self.clear_cookies()?;
        Ok((
            AppendHeaders([(header::SET_COOKIE, auth), (header::SET_COOKIE, info)]),
            error,
        )
            .into_response())
    }

    fn render(
        &self,
        name: &str,
        value: &str,
        http_only: bool,
        max_age: Option<i64>,
    ) -> Result<HeaderValue, ApiError> {
        let mut cookie = format!("{}={}; Path=/; SameSite=Lax", name, value);
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        if let Some(age) = max_age {
            cookie.push_str(&format!("; Max-Age={}", age));
        }

        HeaderValue::from_str(&cookie)
            .map_err(|e| ApiError::Internal(format!("invalid cookie header: {}", e)))
    }
}

/// Value of cookie `name` from the request's `Cookie` headers
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}
