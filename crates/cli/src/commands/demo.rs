//! `demo` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use super::load_config;
use crate::cli::DemoArgs;
use crate::demo::{Demo, DemoConfig};

pub async fn run_demo(args: &DemoArgs) -> Result<()> {
    let streamer = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    info!(
        default_timeout_ms = streamer.session.default_timeout_ms,
        stop_signal_ttl_secs = streamer.session.stop_signal_ttl_secs,
        buffer_threshold = streamer.dispatch.buffer_threshold,
        "Configuration loaded"
    );

    let demo = Demo::new(DemoConfig {
        streamer,
        sessions: args.sessions,
        items: args.items,
        item_interval: Duration::from_millis(args.item_interval_ms),
        stop_after: (args.stop_after_ms > 0).then(|| Duration::from_millis(args.stop_after_ms)),
        buffered: args.buffered,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    });

    // Ctrl+C stops every open session; dispatchers still send their end frames
    let manager = demo.manager().clone();
    let shutdown = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping all sessions");
        for id in manager.registry().session_ids() {
            manager.request_stop(id);
        }
    });

    let result = demo.run().await;
    shutdown.abort();

    let stats = result.context("Demo failed")?;
    stats.print_summary();

    info!("Streamer demo finished");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
