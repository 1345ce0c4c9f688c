use {anyhow::Result, clap::Subcommand, tracing::warn};

use digger_config::{DiggerConfig, Severity, validate};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration and report errors/warnings.
    Check,
    /// Print the effective configuration, env overrides included.
    Show,
    /// Print where config files are looked up.
    Path,
}

pub fn handle_config(config: &DiggerConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => check(config),
        ConfigAction::Show => {
            print!("{}", toml_string(config)?);
            Ok(())
        },
        ConfigAction::Path => {
            match digger_config::config_dir() {
                Some(dir) => println!("{}", dir.display()),
                None => println!("no user config directory on this platform"),
            }
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &DiggerConfig) -> Result<()> {
    let diagnostics = validate(config);

    for d in &diagnostics {
        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;

    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        anyhow::bail!("configuration has {errors} error(s)");
    }
    Ok(())
}

/// Log every diagnostic for the loaded config and refuse to continue when
/// any of them is an error.
pub fn preflight(config: &DiggerConfig) -> Result<()> {
    let diagnostics = validate(config);
    for d in &diagnostics {
        warn!(severity = %d.severity, path = d.path, "{}", d.message);
    }
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(ToString::to_string)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!(
            "invalid configuration ({}); run `digger config check`",
            errors.join("; ")
        );
    }
    Ok(())
}

fn toml_string(config: &DiggerConfig) -> Result<String> {
    Ok(digger_config::to_toml_string(config)?)
}
