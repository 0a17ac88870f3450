//! pingsyncd - bulk user synchronization for PingOne
//!
//! `pingsyncd serve` hosts the upload routes; `pingsyncd run` processes a
//! single CSV from the command line.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use pingsync_core::config::Config;
use tracing::debug;

mod commands;

use commands::{run::RunCommand, serve::ServeCommand};

#[derive(Debug, Parser)]
#[command(name = "pingsyncd", version, about = "Bulk user synchronization for PingOne")]
pub struct Cli {
    /// Verbose output (can be repeated: -v, -vv)
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
    /// Serve the upload and credential routes
    Serve(ServeCommand),
    /// Run one job over a local CSV file
    Run(RunCommand),
}

/// Load the config file, apply `PINGSYNC_*` overrides and validate.
///
/// An explicit `--config` path must exist; the default path is optional.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path()),
    };
    config.apply_env_overrides();

    let errors = config.validate();
    if !errors.is_empty() {
        let lines: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("Invalid configuration:\n  {}", lines.join("\n  "));
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    pingsync_server::logging::init(&config.logging, cli.verbose)?;
    debug!(config = ?cli.config, "Loaded configuration");

    match cli.command {
        Commands::Serve(cmd) => cmd.execute(config).await,
        Commands::Run(cmd) => cmd.execute(config).await,
    }
}

// ============================================================================
// Tests
// ============================================================================
