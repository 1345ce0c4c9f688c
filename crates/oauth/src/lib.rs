//! OAuth2 authorization code + PKCE login for the catalog provider.
//!
//! [`Authenticator::authenticate`] is the entry point: it refreshes the
//! cached token when possible and otherwise runs the browser login through a
//! one-shot local [`CallbackServer`].

pub mod authenticator;
pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod flow;
pub mod pkce;
pub mod storage;
pub mod types;

pub use {
    authenticator::{Authenticator, LogPresenter, LoginPresenter},
    callback_server::{CALLBACK_PATH, CallbackServer, LOGIN_PATH, ListenerState},
    defaults::{callback_port, load_oauth_config},
    flow::{AuthorizationRequest, OAuthFlow, TokenExchanger, authorization_url},
    storage::TokenCache,
    types::{
        AuthorizationResult, OAuthConfig, PkceChallenge, TokenBundle, serialize_option_secret,
        serialize_secret,
    },
};

pub use error::{Error, Result};
