//! # Observability
//!
//! Tracing setup, Prometheus export and the streamer's metric vocabulary.
//!
//! ## Features
//!
//! - Tracing initialization (JSON / Pretty / Compact)
//! - Prometheus metrics exporter
//! - Channel lifecycle and dispatch metrics, plus an in-memory aggregator
//!
//! ## Usage
//!
//! ```ignore
//! observability::init()?;
//!
//! observability::record_channel_opened();
//! // ... stream ...
//! observability::record_channel_closed("complete", elapsed);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_buffer_flush, record_channel_closed, record_channel_opened, record_dispatch_finished,
    record_frame_sent, record_item_error, record_stop_requested, DispatchRecord, MetricsSummary,
    RunningStats, SessionMetricsAggregator, StatsSummary,
};

/// Initialize tracing and the Prometheus exporter with defaults
///
/// - Tracing: JSON, `RUST_LOG` overrides the level
/// - Prometheus: listens on 0.0.0.0:9000
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Level used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Initialize with explicit settings
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Millisecond buckets for the dispatch duration histogram
const DURATION_BUCKETS_MS: &[f64] = &[
    10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 30_000.0, 120_000.0, 480_000.0,
];

/// Byte buckets for buffered flush sizes
const FLUSH_BUCKETS_BYTES: &[f64] = &[64.0, 256.0, 1_024.0, 4_096.0, 16_384.0, 65_536.0];

/// Install only the Prometheus exporter
///
/// For binaries that set up tracing themselves.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .set_buckets_for_metric(Matcher::Suffix("_ms".to_string()), DURATION_BUCKETS_MS)
        .context("Invalid duration buckets")?
        .set_buckets_for_metric(
            Matcher::Full("streamer_buffer_flush_bytes".to_string()),
            FLUSH_BUCKETS_BYTES,
        )
        .context("Invalid flush buckets")?
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
