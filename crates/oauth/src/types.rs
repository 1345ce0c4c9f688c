use std::collections::BTreeSet;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize, Serializer},
};

/// OAuth 2.0 client configuration for the authorization code + PKCE flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl From<&digger_config::AuthConfig> for OAuthConfig {
    fn from(cfg: &digger_config::AuthConfig) -> Self {
        Self {
            client_id: cfg.client_id.clone(),
            auth_url: cfg.auth_url.clone(),
            token_url: cfg.token_url.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
            scopes: cfg.scopes.clone(),
        }
    }
}

/// Tokens issued by the provider, as cached on disk.
///
/// A refresh produces a new bundle; existing bundles are never mutated.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Granted scopes; stored as the provider's space-separated `scope` string.
    #[serde(rename = "scope", default, with = "scope_set")]
    pub scopes: BTreeSet<String>,
    /// Lifetime in seconds as reported by the provider.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_token: Option<Secret<String>>,
    /// Unix timestamp when the access token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenBundle {
    /// Seconds left before expiry, `None` when the expiry is unknown.
    pub fn remaining_secs(&self, now: u64) -> Option<u64> {
        self.expires_at.map(|ts| ts.saturating_sub(now))
    }
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl PartialEq for TokenBundle {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.token_type == other.token_type
            && self.scopes == other.scopes
            && self.expires_in == other.expires_in
            && self.refresh_token.as_ref().map(ExposeSecret::expose_secret)
                == other.refresh_token.as_ref().map(ExposeSecret::expose_secret)
            && self.expires_at == other.expires_at
    }
}

impl std::fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scopes", &self.scopes)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// PKCE challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

/// What the browser brought back to the callback endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Code(String),
    /// Raw `error` value from the provider (or a local reason such as a
    /// missing code or mismatched state).
    Error(String),
}

/// Split a space-delimited OAuth `scope` string.
pub fn parse_scopes(raw: &str) -> BTreeSet<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

mod scope_set {
    use super::*;

    pub fn serialize<S: Serializer>(scopes: &BTreeSet<String>, s: S) -> Result<S::Ok, S::Error> {
        let joined = scopes.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        s.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        let raw = Option::<String>::deserialize(d)?;
        Ok(raw.as_deref().map(parse_scopes).unwrap_or_default())
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

/// Serialize a `Secret<String>` by exposing its inner value.
/// Use only for fields that must round-trip through the token cache.
pub fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Serialize an `Option<Secret<String>>` by exposing its inner value.
pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> TokenBundle {
        TokenBundle {
            access_token: Secret::new("BQD-access".into()),
            token_type: "Bearer".into(),
            scopes: parse_scopes("user-read-private user-library-modify"),
            expires_in: 3600,
            refresh_token: Some(Secret::new("AQD-refresh".into())),
            expires_at: Some(1_700_003_600),
        }
    }

    #[test]
    fn debug_redacts_secrets() {
        let out = format!("{:?}", bundle());
        assert!(!out.contains("BQD-access"));
        assert!(!out.contains("AQD-refresh"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn serializes_scope_as_space_separated_string() {
        let json = serde_json::to_value(bundle()).unwrap();
        assert_eq!(json["scope"], "user-library-modify user-read-private");
        assert_eq!(json["access_token"], "BQD-access");
        assert_eq!(json["refresh_token"], "AQD-refresh");
    }

    #[test]
    fn deserializes_provider_shaped_record() {
        let parsed: TokenBundle = serde_json::from_str(
            r#"{
                "access_token": "a",
                "token_type": "Bearer",
                "scope": "user-read-private",
                "expires_in": 3600,
                "refresh_token": "r"
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.scopes.len(), 1);
        assert_eq!(parsed.expires_at, None);
        assert_eq!(
            parsed.refresh_token.as_ref().map(|s| s.expose_secret().as_str()),
            Some("r")
        );
    }

    #[test]
    fn remaining_secs_saturates() {
        let b = bundle();
        assert_eq!(b.remaining_secs(1_700_000_000), Some(3600));
        assert_eq!(b.remaining_secs(1_800_000_000), Some(0));
    }
}
