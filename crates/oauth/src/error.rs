use std::{error::Error as StdError, time::Duration};

use digger_common::FromMessage;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
    /// The OS randomness source is unusable; nothing can be retried.
    #[error("PKCE generation failed: {reason}")]
    PkceGenerationFailed { reason: String },
    #[error("authorization code exchange failed: {reason}")]
    AuthExchangeFailed { reason: String },
    #[error("token refresh failed: {reason}")]
    RefreshFailed { reason: String },
    #[error("no authorization callback received within {:?}", .timeout)]
    AuthenticationTimedOut { timeout: Duration },
    #[error("authentication failed: {source}")]
    AuthenticationFailed {
        #[source]
        source: Box<Error>,
    },
    #[error("{message}")]
    Message { message: String },
    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn exchange_failed(reason: impl std::fmt::Display) -> Self {
        Self::AuthExchangeFailed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn refresh_failed(reason: impl std::fmt::Display) -> Self {
        Self::RefreshFailed {
            reason: reason.to_string(),
        }
    }

    /// Wrap a cause as the terminal failure of an authentication run.
    #[must_use]
    pub fn authentication_failed(source: Error) -> Self {
        Self::AuthenticationFailed {
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

digger_common::impl_context!();
