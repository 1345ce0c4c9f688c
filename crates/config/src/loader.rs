use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    digger_common::{Error, Result},
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::DiggerConfig};

const CONFIG_FILENAMES: &[&str] = &["digger.toml", "digger.yaml", "digger.yml", "digger.json"];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Use `dir` instead of the platform config directory (`--config-dir`).
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(|e| e.into_inner()) = None;
}

/// Returns the user-global config directory.
///
/// Resolution order:
/// 1. programmatic override (`set_config_dir`)
/// 2. `~/.config/digger` (platform equivalent)
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "digger").map(|d| d.config_dir().to_path_buf())
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<DiggerConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::other(format!("failed to read {}", path.display()), e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply env overrides.
///
/// Search order:
/// 1. `./digger.{toml,yaml,yml,json}` (project-local)
/// 2. `<config dir>/digger.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `DiggerConfig::default()` when nothing is found or the file
/// does not parse.
pub fn discover_and_load() -> DiggerConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                DiggerConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            DiggerConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Override individual fields from `DIGGER_*` environment variables.
pub fn apply_env_overrides(config: &mut DiggerConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut DiggerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("DIGGER_CLIENT_ID") {
        config.auth.client_id = v;
    }
    if let Some(v) = lookup("DIGGER_AUTH_URL") {
        config.auth.auth_url = v;
    }
    if let Some(v) = lookup("DIGGER_TOKEN_URL") {
        config.auth.token_url = v;
    }
    if let Some(v) = lookup("DIGGER_REDIRECT_URI") {
        config.auth.redirect_uri = v;
    }
    if let Some(v) = lookup("DIGGER_API_BASE_URL") {
        config.api.base_url = v;
    }
    if let Some(v) = lookup("DIGGER_CACHE_PATH") {
        config.cache.path = PathBuf::from(v);
    }
}

/// Render `config` as TOML, the format `digger config show` prints.
pub fn to_toml_string(config: &DiggerConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| Error::other("failed to serialize config", e))
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<DiggerConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let context = format!("failed to parse {}", path.display());

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::other(context, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::other(context, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::other(context, e)),
        _ => Err(Error::message(format!("unsupported config format: .{ext}"))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_toml_loads_back() {
        let mut cfg = DiggerConfig::default();
        cfg.api.batch_size = 25;
        let text = to_toml_string(&cfg).unwrap();
        assert!(text.contains("batch_size = 25"));
        let parsed: DiggerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn loads_each_supported_format() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("digger.toml");
        std::fs::write(&toml_path, "[api]\nbatch_size = 20\n").unwrap();
        assert_eq!(load_config(&toml_path).unwrap().api.batch_size, 20);

        let yaml_path = dir.path().join("digger.yaml");
        std::fs::write(&yaml_path, "api:\n  market: SE\n").unwrap();
        assert_eq!(load_config(&yaml_path).unwrap().api.market, "SE");

        let json_path = dir.path().join("digger.json");
        std::fs::write(&json_path, r#"{"cache": {"path": "/tmp/t"}}"#).unwrap();
        assert_eq!(
            load_config(&json_path).unwrap().cache.path,
            PathBuf::from("/tmp/t")
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digger.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digger.toml");
        std::fs::write(&path, "[auth\nclient_id = ").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("digger.toml"));
    }

    #[test]
    fn discovers_file_in_overridden_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("digger.toml"),
            "[auth]\ncallback_timeout_secs = 42\n",
        )
        .unwrap();

        set_config_dir(dir.path().to_path_buf());
        assert_eq!(config_dir(), Some(dir.path().to_path_buf()));
        let cfg = discover_and_load();
        clear_config_dir();

        assert_eq!(cfg.auth.callback_timeout_secs, 42);
        assert_ne!(config_dir(), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn env_overrides_replace_fields() {
        let mut cfg = DiggerConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "DIGGER_CLIENT_ID" => Some("override".into()),
            "DIGGER_CACHE_PATH" => Some("/var/cache/digger/tokens".into()),
            _ => None,
        });
        assert_eq!(cfg.auth.client_id, "override");
        assert_eq!(cfg.cache.path, PathBuf::from("/var/cache/digger/tokens"));
        assert_eq!(cfg.api, DiggerConfig::default().api);
    }
}
