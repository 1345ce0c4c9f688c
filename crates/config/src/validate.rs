//! Semantic checks on a loaded configuration.

use crate::schema::{DiggerConfig, MAX_BATCH_SIZE};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "api.batch_size"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.path, self.message)
    }
}

/// Check value ranges the schema types cannot express.
#[must_use]
pub fn validate(config: &DiggerConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let mut push = |severity, path, message: String| {
        out.push(Diagnostic {
            severity,
            path,
            message,
        })
    };

    if config.auth.client_id.trim().is_empty() {
        push(Severity::Error, "auth.client_id", "must not be empty".into());
    }
    if config.auth.callback_timeout_secs == 0 {
        push(
            Severity::Error,
            "auth.callback_timeout_secs",
            "must be greater than zero".into(),
        );
    }
    if config.auth.scopes.is_empty() {
        push(
            Severity::Warning,
            "auth.scopes",
            "no scopes requested; library writes will be rejected".into(),
        );
    }
    if !(1..=MAX_BATCH_SIZE).contains(&config.api.batch_size) {
        push(
            Severity::Error,
            "api.batch_size",
            format!("must be between 1 and {MAX_BATCH_SIZE}"),
        );
    }
    if config.api.retry.max_attempts == 0 {
        push(
            Severity::Error,
            "api.retry.max_attempts",
            "must be at least 1".into(),
        );
    }
    if !config.auth.redirect_uri.starts_with("http://localhost")
        && !config.auth.redirect_uri.starts_with("http://127.0.0.1")
    {
        push(
            Severity::Warning,
            "auth.redirect_uri",
            "callback listener only binds loopback; redirect should point at localhost".into(),
        );
    }

    out
}
