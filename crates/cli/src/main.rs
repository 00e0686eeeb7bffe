//! # Streamer CLI
//!
//! Command-line entry point.
//!
//! - Configuration loading and validation
//! - A demo that drives concurrent sessions through the dispatcher
//! - Graceful shutdown on Ctrl+C

mod cli;
mod commands;
mod demo;
mod error;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_demo, run_info, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    contracts::init_end_timestamp();
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Streamer CLI starting");

    let result = match &cli.command {
        Commands::Demo(args) => run_demo(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let log_format = match cli.log_format {
        cli::LogFormat::Json => observability::LogFormat::Json,
        cli::LogFormat::Pretty => observability::LogFormat::Pretty,
        cli::LogFormat::Compact => observability::LogFormat::Compact,
    };

    // the demo installs the exporter itself when asked to
    observability::init_with_config(observability::ObservabilityConfig {
        log_format,
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
    })
}
