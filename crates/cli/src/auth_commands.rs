use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {
    anyhow::Result,
    digger_config::DiggerConfig,
    digger_oauth::{Authenticator, LoginPresenter, TokenBundle, TokenCache, load_oauth_config},
};

/// Prints the login URL and, unless disabled, opens it in the default browser.
struct BrowserPresenter {
    open_browser: bool,
}

impl LoginPresenter for BrowserPresenter {
    fn present(&self, login_url: &str) {
        if self.open_browser {
            println!("Opening browser for authentication...");
            if open::that(login_url).is_err() {
                println!("Could not open browser. Please visit:\n{login_url}");
            }
        } else {
            println!("Visit this URL to log in:\n{login_url}");
        }
        println!("Waiting for the login to complete...");
    }
}

pub fn authenticator(config: &DiggerConfig, open_browser: bool) -> Authenticator {
    let presenter = Arc::new(BrowserPresenter { open_browser });
    Authenticator::new(load_oauth_config(config), TokenCache::from_config(&config.cache))
        .with_presenter(presenter)
        .with_callback_timeout(Duration::from_secs(config.auth.callback_timeout_secs))
}

/// Obtain a token the way every catalog command does.
pub async fn obtain_token(config: &DiggerConfig) -> Result<TokenBundle> {
    let auth = authenticator(config, config.auth.open_browser);
    Ok(auth.authenticate().await?)
}

pub async fn login(config: &DiggerConfig, no_browser: bool) -> Result<()> {
    let auth = authenticator(config, config.auth.open_browser && !no_browser);
    let bundle = auth.authenticate().await?;
    println!("Logged in ({})", describe_expiry(&bundle, now_secs()));
    Ok(())
}

pub fn logout(config: &DiggerConfig) -> Result<()> {
    let cache = TokenCache::from_config(&config.cache);
    cache.clear()?;
    println!("Logged out; removed {}", cache.path().display());
    Ok(())
}

pub fn status(config: &DiggerConfig) -> Result<()> {
    let cache = TokenCache::from_config(&config.cache);
    match cache.load() {
        Some(bundle) => {
            println!("Token cached at {}", cache.path().display());
            println!("  access token: {}", describe_expiry(&bundle, now_secs()));
            println!(
                "  refresh token: {}",
                if bundle.refresh_token.is_some() {
                    "present"
                } else {
                    "missing"
                }
            );
            if !bundle.scopes.is_empty() {
                let scopes: Vec<&str> = bundle.scopes.iter().map(String::as_str).collect();
                println!("  scopes: {}", scopes.join(" "));
            }
        },
        None => println!("Not logged in."),
    }
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn describe_expiry(bundle: &TokenBundle, now: u64) -> String {
    match bundle.remaining_secs(now) {
        None => "expiry unknown".to_string(),
        Some(0) => "expired".to_string(),
        Some(remaining) => {
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            format!("valid, {hours}h {mins}m remaining")
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    fn bundle(expires_at: Option<u64>) -> TokenBundle {
        TokenBundle {
            access_token: Secret::new("A".into()),
            token_type: "Bearer".into(),
            scopes: Default::default(),
            expires_in: 3600,
            refresh_token: None,
            expires_at,
        }
    }

    #[test]
    fn expiry_descriptions() {
        assert_eq!(describe_expiry(&bundle(None), 100), "expiry unknown");
        assert_eq!(describe_expiry(&bundle(Some(50)), 100), "expired");
        assert_eq!(
            describe_expiry(&bundle(Some(100 + 3600 + 120)), 100),
            "valid, 1h 2m remaining"
        );
    }

    #[test]
    fn logout_without_cache_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = DiggerConfig::default();
        config.cache.path = dir.path().join("tokens");
        logout(&config).unwrap();
        status(&config).unwrap();
    }
}
