//! Configuration loading, validation and env substitution.
//!
//! Config files: `digger.toml`, `digger.yaml` or `digger.json`.
//! Searched in `./` then the user config directory (`~/.config/digger/`).
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, clear_config_dir, config_dir, discover_and_load, load_config,
        set_config_dir, to_toml_string,
    },
    schema::{ApiConfig, AuthConfig, CacheConfig, DiggerConfig, RetryConfig},
    validate::{Diagnostic, Severity, validate},
};
