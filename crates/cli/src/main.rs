mod auth_commands;
mod catalog_commands;
mod config_commands;

use {
    clap::{Parser, Subcommand},
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "digger", about = "Digger: search the catalog and save to your library")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/digger/).
    #[arg(long, global = true, env = "DIGGER_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in through the browser, or refresh the cached token.
    Login {
        /// Print the login URL instead of opening a browser.
        #[arg(long)]
        no_browser: bool,
    },
    /// Forget the cached token.
    Logout,
    /// Show whether a token is cached and how long it stays valid.
    Status,
    /// Search the catalog.
    Search(catalog_commands::SearchArgs),
    /// Save items to your library.
    Save(catalog_commands::SaveArgs),
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "digger starting");

    if let Some(ref dir) = cli.config_dir {
        digger_config::set_config_dir(dir.clone());
    }
    let config = digger_config::discover_and_load();
    if !matches!(cli.command, Commands::Config { .. }) {
        config_commands::preflight(&config)?;
    }

    match cli.command {
        Commands::Login { no_browser } => auth_commands::login(&config, no_browser).await,
        Commands::Logout => auth_commands::logout(&config),
        Commands::Status => auth_commands::status(&config),
        Commands::Search(args) => catalog_commands::search(&config, args).await,
        Commands::Save(args) => catalog_commands::save(&config, args).await,
        Commands::Config { action } => config_commands::handle_config(&config, action),
    }
}
