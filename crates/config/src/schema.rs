//! Config schema: OAuth client settings, catalog API tuning, token cache location.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CLIENT_ID: &str = "c2c4830c1bd64f0a9cb932091a365d0c";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:4242/oauth2/callback";
pub const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_CACHE_PATH: &str = ".cache/tokens";

/// Largest number of ids the library endpoints accept per request.
pub const MAX_BATCH_SIZE: usize = 50;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiggerConfig {
    pub auth: AuthConfig,
    pub api: ApiConfig,
    pub cache: CacheConfig,
}

/// OAuth client registration and interactive login behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub client_id: String,
    pub auth_url: String,
    pub token_url: String,
    /// Must match the redirect URI registered with the provider. Its port is
    /// the port the local callback listener binds.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// How long to wait for the browser to come back before giving up.
    pub callback_timeout_secs: u64,
    pub open_browser: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.into(),
            auth_url: DEFAULT_AUTH_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            scopes: vec!["user-library-modify".into(), "user-read-private".into()],
            callback_timeout_secs: 300,
            open_browser: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Market passed to search; `from_token` uses the account's country.
    pub market: String,
    pub batch_size: usize,
    pub retry: RetryConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            market: "from_token".into(),
            batch_size: 40,
            retry: RetryConfig::default(),
        }
    }
}

/// Bounds for the rate-limit retry loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub max_elapsed_secs: u64,
    /// Delay used when a 429 carries no usable `Retry-After`.
    pub fallback_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            max_elapsed_secs: 120,
            fallback_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Token record location, relative paths resolve against the working directory.
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_PATH),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: DiggerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, DiggerConfig::default());
        assert_eq!(cfg.api.batch_size, 40);
        assert_eq!(cfg.api.retry.fallback_delay_ms, 100);
        assert_eq!(cfg.cache.path, PathBuf::from(".cache/tokens"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: DiggerConfig = toml::from_str(
            r#"
            [auth]
            client_id = "my-client"

            [api.retry]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.auth.client_id, "my-client");
        assert_eq!(cfg.auth.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(cfg.api.retry.max_attempts, 3);
        assert_eq!(cfg.api.retry.max_elapsed_secs, 120);
    }
}
