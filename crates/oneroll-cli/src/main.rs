//! OneRoll CLI - Command-line interface for OneRoll
//!
//! Provides commands for:
//! - Joining an occasion from an invite and inspecting configuration
//! - Enrolling with the broker and managing the stored token
//! - Uploading photos and syncing own or occasion-wide photos
//! - Showing local status and remaining shots

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use oneroll_core::config::Config;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;
mod output;

use commands::{
    auth::AuthCommand, config::ConfigCommand, status::StatusCommand, sync::SyncCommand,
    upload::UploadCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "oneroll", version, about = "Shared disposable camera for occasions")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// View configuration and join occasions
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Broker enrollment and token management
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Upload photos to the occasion
    Upload(UploadCommand),
    /// Download missing photos
    Sync(SyncCommand),
    /// Show occasion, device and local photo status
    Status(StatusCommand),
}

/// Log filter directive: `-v` wins over the configured level
fn log_level(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // RUST_LOG takes precedence over flags and config
    let configured = Config::load_or_default(&config_path).logging.level;
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose, &configured)));

    // Logs go to stderr so command output on stdout stays parseable
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
        Commands::Auth(cmd) => cmd.execute(&config_path, format).await,
        Commands::Upload(cmd) => cmd.execute(&config_path, format).await,
        Commands::Sync(cmd) => cmd.execute(&config_path, format).await,
        Commands::Status(cmd) => cmd.execute(&config_path, format).await,
    }
}
