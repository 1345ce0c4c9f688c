use std::time::{SystemTime, UNIX_EPOCH};

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    Error, Result,
    error::Context,
    pkce::{generate_pkce, generate_state},
    types::{OAuthConfig, PkceChallenge, TokenBundle, parse_scopes},
};

/// Turns authorization codes and refresh tokens into [`TokenBundle`]s.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// `grant_type=authorization_code`; failures are [`Error::AuthExchangeFailed`].
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenBundle>;

    /// `grant_type=refresh_token`; failures are [`Error::RefreshFailed`].
    ///
    /// When the provider does not rotate the refresh token, the one from
    /// `bundle` is carried over into the result.
    async fn refresh(&self, bundle: &TokenBundle) -> Result<TokenBundle>;
}

/// Manages the OAuth 2.0 authorization code flow with PKCE.
pub struct OAuthFlow {
    config: OAuthConfig,
    client: reqwest::Client,
}

/// Everything one login attempt needs: the consent URL plus the PKCE pair and
/// `state` it was built with.
pub struct AuthorizationRequest {
    pub url: String,
    pub pkce: PkceChallenge,
    pub state: String,
}

impl AuthorizationRequest {
    /// Generate a fresh PKCE pair and `state`, then build the consent URL.
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let pkce = generate_pkce()?;
        let state = generate_state()?;
        let url = authorization_url(config, &pkce.challenge, &state)?;
        Ok(Self { url, pkce, state })
    }
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::message(format!(
                "token endpoint returned {status}: {}",
                describe_error_body(&body)
            )));
        }

        Ok(resp.json::<serde_json::Value>().await?)
    }
}

/// Provider consent page URL for one login attempt.
pub fn authorization_url(config: &OAuthConfig, challenge: &str, state: &str) -> Result<String> {
    let mut url = Url::parse(&config.auth_url)
        .map_err(|source| Error::external(format!("invalid auth_url: {source}"), source))?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", challenge)
        .append_pair("state", state);

    if !config.scopes.is_empty() {
        url.query_pairs_mut()
            .append_pair("scope", &config.scopes.join(" "));
    }

    Ok(url.to_string())
}

#[async_trait]
impl TokenExchanger for OAuthFlow {
    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenBundle> {
        debug!(token_url = %self.config.token_url, "exchanging authorization code");
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        let result = self
            .post_token_form(&form)
            .await
            .and_then(|resp| parse_token_response(&resp, None));
        match result {
            Ok(bundle) => {
                info!(scopes = bundle.scopes.len(), "authorization code exchanged");
                Ok(bundle)
            },
            Err(e) => {
                warn!(error = %e, "authorization code exchange failed");
                Err(Error::exchange_failed(e))
            },
        }
    }

    async fn refresh(&self, bundle: &TokenBundle) -> Result<TokenBundle> {
        let Some(refresh_token) = bundle.refresh_token.as_ref() else {
            return Err(Error::refresh_failed("cached token has no refresh_token"));
        };

        debug!(token_url = %self.config.token_url, "refreshing access token");
        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret().as_str()),
        ];

        self.post_token_form(&form)
            .await
            .and_then(|resp| parse_token_response(&resp, Some(bundle)))
            .map_err(Error::refresh_failed)
    }
}

/// Build a bundle from a token endpoint response.
///
/// Fields the provider leaves out of a refresh response (`refresh_token`,
/// `scope`) are taken from `previous`.
fn parse_token_response(
    resp: &serde_json::Value,
    previous: Option<&TokenBundle>,
) -> Result<TokenBundle> {
    let access_token = resp["access_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .context("missing access_token in response")?
        .to_string();

    let token_type = resp["token_type"].as_str().unwrap_or("Bearer").to_string();

    let scopes = match (resp["scope"].as_str(), previous) {
        (Some(raw), _) => parse_scopes(raw),
        (None, Some(prev)) => prev.scopes.clone(),
        (None, None) => Default::default(),
    };

    let refresh_token = match (resp["refresh_token"].as_str(), previous) {
        (Some(token), _) if !token.is_empty() => Some(Secret::new(token.to_string())),
        (_, Some(prev)) => prev.refresh_token.clone(),
        _ => None,
    };

    let expires_in = resp["expires_in"].as_u64().unwrap_or_default();
    let expires_at = resp["expires_in"].as_u64().and_then(|secs| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() + secs)
    });

    Ok(TokenBundle {
        access_token: Secret::new(access_token),
        token_type,
        scopes,
        expires_in,
        refresh_token,
        expires_at,
    })
}

/// Short human description of a token endpoint error body.
fn describe_error_body(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let code = json["error"].as_str();
        let description = json["error_description"].as_str();
        match (code, description) {
            (Some(code), Some(description)) => return format!("{code} ({description})"),
            (Some(code), None) => return code.to_string(),
            _ => {},
        }
    }
    body.chars().take(200).collect()
}
