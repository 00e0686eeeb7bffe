//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Streamer - server-sent event sessions with cancellable dispatch
#[derive(Parser, Debug)]
#[command(
    name = "streamer",
    author,
    version,
    about = "SSE session streaming toolkit",
    long_about = "Manages server-sent event sessions: a registry of open channels,\n\
                  TTL-bounded stop requests and a dispatcher that pumps producers\n\
                  into channels, optionally buffered."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace; `RUST_LOG` takes precedence)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "STREAMER_VERBOSE")]
    pub verbose: u8,

    /// Only warnings and errors (`RUST_LOG` still takes precedence)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "STREAMER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive synthetic sessions through the dispatcher and print a summary
    Demo(DemoArgs),

    /// Validate a configuration file
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `demo` command
#[derive(Parser, Debug, Clone)]
pub struct DemoArgs {
    /// Configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "STREAMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of concurrent sessions
    #[arg(long, default_value = "4", env = "STREAMER_DEMO_SESSIONS")]
    pub sessions: usize,

    /// Items each producer emits
    #[arg(long, default_value = "50", env = "STREAMER_DEMO_ITEMS")]
    pub items: usize,

    /// Pause between produced items in milliseconds
    #[arg(long, default_value = "10")]
    pub item_interval_ms: u64,

    /// Request a stop for every other session after this many ms (0 = never)
    #[arg(long, default_value = "0")]
    pub stop_after_ms: u64,

    /// Use the buffered dispatcher with the configured threshold
    #[arg(long)]
    pub buffered: bool,

    /// Prometheus exporter port (0 = disabled)
    #[arg(long, default_value = "0", env = "STREAMER_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Configuration file to validate
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, conflicts_with = "toml")]
    pub json: bool,

    /// Output as TOML
    #[arg(long)]
    pub toml: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
