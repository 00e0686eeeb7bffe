//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::{ConfigLoader, StreamerConfig};
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

pub fn run_info(args: &InfoArgs) -> Result<()> {
    match &args.config {
        Some(path) => info!(config = %path.display(), "Loading configuration info"),
        None => info!("No configuration file given, showing defaults"),
    }

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    if args.json {
        println!("{}", ConfigLoader::to_json(&config)?);
    } else if args.toml {
        print!("{}", ConfigLoader::to_toml(&config)?);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn print_config_info(config: &StreamerConfig) {
    println!("=== Streamer Configuration ===\n");

    let session = &config.session;
    println!("Sessions");
    match session.default_timeout() {
        Some(timeout) => println!("   ├─ Default timeout: {:?}", timeout),
        None => println!("   ├─ Default timeout: none"),
    }
    println!("   ├─ Stop signal TTL: {:?}", session.stop_signal_ttl());
    println!("   ├─ Registry capacity: {}", session.registry_capacity);
    println!("   └─ Queue capacity: {}", session.queue_capacity);

    let dispatch = &config.dispatch;
    println!("\nDispatch");
    println!("   ├─ Buffer threshold: {} bytes", dispatch.buffer_threshold);
    println!("   └─ End timestamp: {:?}", dispatch.end_timestamp);

    let typewriter = &config.typewriter;
    println!("\nTypewriter");
    println!("   ├─ Letter delay: {} ms", typewriter.letter_delay_ms);
    println!("   └─ Default interval: {} ms", typewriter.default_interval_ms);

    println!();
}
