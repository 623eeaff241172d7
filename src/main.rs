mod commands;
mod homeassistant;
mod outlook;
mod render;
mod utils;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ha365_core::config::SyncConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ha365-sync")]
#[command(about = "Mirror Home Assistant calendars into an Office 365 calendar")]
struct Cli {
    /// Config file (defaults to ~/.config/ha365-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log every per-event decision
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle (default)
    Sync {
        /// Sign in first if no Office 365 token is cached
        #[arg(short, long)]
        interactive: bool,
    },
    /// Sync continuously until interrupted
    Run {
        /// Time between cycles, e.g. "900" or "15m" (overrides SYNC_INTERVAL)
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Sign in to Office 365 with a device code
    Auth,
    /// Show what the next sync would change
    Status,
    /// Delete every synced event in the sync window
    Purge {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Check config, token, Home Assistant and Office 365 access
    Health,
    /// Write a config template
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    ha365_core::retry::parse_duration("--interval", value).map_err(|e| e.to_string())
}

/// `RUST_LOG` wins, then `LOG_LEVEL`, then `info` (or `debug` with `-v`).
fn init_tracing(verbose: bool) {
    let fallback = std::env::var("LOG_LEVEL")
        .ok()
        .filter(|level| !level.trim().is_empty())
        .unwrap_or_else(|| if verbose { "debug" } else { "info" }.to_string());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => SyncConfig::default_path()?,
    };
    let command = cli.command.unwrap_or(Commands::Sync { interactive: false });

    let load = || commands::load_config(&config_path);

    match command {
        Commands::Sync { interactive } => commands::sync::run(&load()?, interactive).await,
        Commands::Run { interval } => commands::run::run(&load()?, interval).await,
        Commands::Auth => commands::auth::run(&load()?).await,
        Commands::Status => commands::status::run(&load()?, cli.verbose).await,
        Commands::Purge { yes } => commands::purge::run(&load()?, yes).await,
        Commands::Health => commands::health::run(&config_path).await,
        Commands::Init { force } => commands::init::run(&config_path, force),
    }
}
