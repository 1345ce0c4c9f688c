use crate::types::OAuthConfig;

/// Port the callback listener binds when the redirect URI names none.
pub const DEFAULT_CALLBACK_PORT: u16 = 4242;

/// Build the OAuth client config from the loaded application config.
pub fn load_oauth_config(config: &digger_config::DiggerConfig) -> OAuthConfig {
    OAuthConfig::from(&config.auth)
}

/// The callback port for a provider config (parsed from redirect_uri).
pub fn callback_port(config: &OAuthConfig) -> u16 {
    url::Url::parse(&config.redirect_uri)
        .ok()
        .and_then(|u| u.port())
        .unwrap_or(DEFAULT_CALLBACK_PORT)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_targets_spotify() {
        let config = load_oauth_config(&digger_config::DiggerConfig::default());
        assert_eq!(config.client_id, "c2c4830c1bd64f0a9cb932091a365d0c");
        assert_eq!(config.auth_url, "https://accounts.spotify.com/authorize");
        assert_eq!(config.token_url, "https://accounts.spotify.com/api/token");
        assert_eq!(
            config.redirect_uri,
            "http://localhost:4242/oauth2/callback"
        );
        assert_eq!(config.scopes, vec![
            "user-library-modify".to_string(),
            "user-read-private".to_string()
        ]);
    }

    #[test]
    fn callback_port_with_redirect_uri() {
        let config = load_oauth_config(&digger_config::DiggerConfig::default());
        assert_eq!(callback_port(&config), 4242);
    }

    #[test]
    fn callback_port_falls_back_without_explicit_port() {
        let mut config = load_oauth_config(&digger_config::DiggerConfig::default());
        config.redirect_uri = "http://localhost/oauth2/callback".into();
        assert_eq!(callback_port(&config), DEFAULT_CALLBACK_PORT);
        config.redirect_uri = String::new();
        assert_eq!(callback_port(&config), DEFAULT_CALLBACK_PORT);
    }
}
