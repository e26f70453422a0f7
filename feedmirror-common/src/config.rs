//! Bootstrap configuration
//!
//! Resolution order for every setting:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable (`FEEDMIRROR_*`)
//! 3. TOML config file
//! 4. Built-in default
//!
//! Configuration is read once at startup and never mutated afterwards.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8888;
const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener and API gate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Value every API request must carry in `x-api-key`.
    /// Unset means every API request is rejected.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            api_key: None,
        }
    }
}

/// SQLite location and lock handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// Upper bound on retrying a write that hit `database is locked`
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }
}

/// Session artifact (signed cookie) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC key for the session cookie
    pub secret: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            domain: None,
            secure: true,
        }
    }
}

/// Upstream feed provider endpoints and credentials
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_base_url: String,
    pub feed_path: String,
    pub secure_token_url: String,
    pub token_exchange_url: String,
    /// Key appended to the identity-token mint call
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub request_timeout_secs: u64,
    pub requests_per_second: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://mobile.bereal.com/api".to_string(),
            feed_path: "/feeds/friends".to_string(),
            secure_token_url: "https://securetoken.googleapis.com/v1/token".to_string(),
            token_exchange_url: "https://auth.bereal.team/token".to_string(),
            api_key: None,
            client_id: None,
            client_secret: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load configuration from `path`, or from the platform default location.
    ///
    /// A missing file is not an error: defaults are used and a warning logged.
    /// Environment overrides are applied on top of whatever was loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match candidate {
            Some(ref p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
                info!("Loaded configuration from {}", p.display());
                Self::from_toml_str(&content)?
            }
            Some(ref p) if path.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            _ => {
                warn!("No configuration file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Overlay `FEEDMIRROR_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("FEEDMIRROR_API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(v) = env_value("FEEDMIRROR_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid FEEDMIRROR_PORT '{}'", v),
            }
        }
        if let Some(v) = env_value("FEEDMIRROR_DATABASE") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = env_value("FEEDMIRROR_SESSION_SECRET") {
            self.session.secret = Some(v);
        }
        if let Some(v) = env_value("FEEDMIRROR_PROVIDER_API_KEY") {
            self.provider.api_key = Some(v);
        }
        if let Some(v) = env_value("FEEDMIRROR_CLIENT_ID") {
            self.provider.client_id = Some(v);
        }
        if let Some(v) = env_value("FEEDMIRROR_CLIENT_SECRET") {
            self.provider.client_secret = Some(v);
        }
    }

    /// Check that everything the service cannot start without is present
    pub fn validate(&self) -> Result<()> {
        if !is_present(&self.session.secret) {
            return Err(Error::Config(
                "Session secret not configured. Set [session] secret or FEEDMIRROR_SESSION_SECRET"
                    .to_string(),
            ));
        }
        if !is_present(&self.provider.client_id) || !is_present(&self.provider.client_secret) {
            return Err(Error::Config(
                "Provider client id/secret not configured. Set [provider] client_id/client_secret \
                 or FEEDMIRROR_CLIENT_ID/FEEDMIRROR_CLIENT_SECRET"
                    .to_string(),
            ));
        }
        if self.provider.requests_per_second == 0 {
            return Err(Error::Config(
                "provider.requests_per_second must be at least 1".to_string(),
            ));
        }
        if !is_present(&self.server.api_key) {
            warn!("No API key configured: every API request will be rejected");
        }
        Ok(())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// `~/.config/feedmirror/config.toml` (platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("feedmirror").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("feedmirror").join("feedmirror.db"))
        .unwrap_or_else(|| PathBuf::from("./feedmirror_data/feedmirror.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.database.max_lock_wait_ms, 5000);
        assert_eq!(config.provider.request_timeout_secs, 30);
        assert!(config.session.secure);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9000

            [provider]
            client_id = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.provider.client_id.as_deref(), Some("abc"));
        assert_eq!(config.provider.feed_path, "/feeds/friends");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = AppConfig::from_toml_str("[server\nport = ");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_requires_secrets() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_err());

        config.session.secret = Some("s3cret".to_string());
        assert!(config.validate().is_err());

        config.provider.client_id = Some("id".to_string());
        config.provider.client_secret = Some("  ".to_string());
        assert!(config.validate().is_err());

        config.provider.client_secret = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }
}
