//! Single entry point for obtaining a usable token: cached refresh first,
//! interactive browser login as the fallback.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    Error, Result,
    callback_server::CallbackServer,
    defaults::callback_port,
    flow::{AuthorizationRequest, OAuthFlow, TokenExchanger},
    storage::TokenCache,
    types::{AuthorizationResult, OAuthConfig, TokenBundle},
};

/// Shows the user where to go to log in.
pub trait LoginPresenter: Send + Sync {
    fn present(&self, login_url: &str);
}

/// Logs the login URL; the CLI supplies a presenter that prints and opens it.
pub struct LogPresenter;

impl LoginPresenter for LogPresenter {
    fn present(&self, login_url: &str) {
        info!(url = %login_url, "open this URL to log in");
    }
}

pub struct Authenticator {
    config: OAuthConfig,
    exchanger: Arc<dyn TokenExchanger>,
    cache: TokenCache,
    presenter: Arc<dyn LoginPresenter>,
    callback_timeout: Duration,
}

impl Authenticator {
    /// Authenticator backed by a real [`OAuthFlow`] against `config.token_url`.
    pub fn new(config: OAuthConfig, cache: TokenCache) -> Self {
        let exchanger = Arc::new(OAuthFlow::new(config.clone()));
        Self::with_exchanger(config, exchanger, cache)
    }

    pub fn with_exchanger(
        config: OAuthConfig,
        exchanger: Arc<dyn TokenExchanger>,
        cache: TokenCache,
    ) -> Self {
        Self {
            config,
            exchanger,
            cache,
            presenter: Arc::new(LogPresenter),
            callback_timeout: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_presenter(mut self, presenter: Arc<dyn LoginPresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    #[must_use]
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Return a fresh token, refreshing the cached one or running the
    /// interactive login.
    ///
    /// Errors: [`Error::AuthenticationTimedOut`] when the browser never came
    /// back, [`Error::PkceGenerationFailed`] when no randomness is available,
    /// and [`Error::AuthenticationFailed`] for everything else.
    pub async fn authenticate(&self) -> Result<TokenBundle> {
        if let Some(bundle) = self.refresh_cached().await {
            return Ok(bundle);
        }

        let bundle = match self.interactive_login().await {
            Ok(bundle) => bundle,
            Err(
                e @ (Error::AuthenticationTimedOut { .. } | Error::PkceGenerationFailed { .. }),
            ) => return Err(e),
            Err(e) => return Err(Error::authentication_failed(e)),
        };
        self.persist(&bundle);
        Ok(bundle)
    }

    async fn refresh_cached(&self) -> Option<TokenBundle> {
        let cached = self.cache.load()?;
        match self.exchanger.refresh(&cached).await {
            Ok(fresh) => {
                info!("refreshed cached token");
                self.persist(&fresh);
                Some(fresh)
            },
            Err(e) => {
                warn!(error = %e, "cached token could not be refreshed, starting login");
                None
            },
        }
    }

    async fn interactive_login(&self) -> Result<TokenBundle> {
        let AuthorizationRequest { url, pkce, state } = AuthorizationRequest::new(&self.config)?;

        let mut server =
            CallbackServer::new(callback_port(&self.config), url).with_expected_state(state);
        server.listen().await?;
        if let Some(url) = server.login_url() {
            self.presenter.present(&url);
        }

        let code = match server.wait_for_result(self.callback_timeout).await {
            Ok(AuthorizationResult::Code(code)) => code,
            Ok(AuthorizationResult::Error(reason)) => {
                server.mark_done(false);
                server.shutdown().await;
                return Err(Error::exchange_failed(format!(
                    "provider redirected without a code: {reason}"
                )));
            },
            Err(e) => {
                server.shutdown().await;
                return Err(e);
            },
        };

        server.mark_exchanging();
        let result = self.exchanger.exchange_code(&code, &pkce.verifier).await;
        server.mark_done(result.is_ok());
        server.shutdown().await;
        result
    }

    fn persist(&self, bundle: &TokenBundle) {
        if let Err(e) = self.cache.save(bundle) {
            warn!(path = %self.cache.path().display(), error = %e, "failed to cache token");
        }
    }
}
