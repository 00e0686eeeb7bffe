//! Streamer metrics
//!
//! Thin wrappers over the `metrics` facade so every crate records the same
//! names and labels, plus an in-memory aggregator for end-of-run reports.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// A channel was opened (registered or detached)
pub fn record_channel_opened() {
    counter!("streamer_channels_opened_total").increment(1);
    gauge!("streamer_channels_active").increment(1.0);
}

/// A channel reached `Closed`
///
/// `reason` is one of `complete`, `error`, `timeout`.
pub fn record_channel_closed(reason: &'static str, lifetime: Duration) {
    counter!("streamer_channels_closed_total", "reason" => reason).increment(1);
    gauge!("streamer_channels_active").decrement(1.0);
    histogram!("streamer_channel_lifetime_ms").record(lifetime.as_secs_f64() * 1000.0);
}

/// One frame write attempt
pub fn record_frame_sent(event: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "streamer_frames_sent_total",
        "event" => event.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_stop_requested() {
    counter!("streamer_stop_requests_total").increment(1);
}

pub fn record_item_error() {
    counter!("streamer_item_errors_total").increment(1);
}

/// Bytes pushed by one buffered flush
pub fn record_buffer_flush(bytes: usize) {
    histogram!("streamer_buffer_flush_bytes").record(bytes as f64);
}

/// A dispatcher loop finished
pub fn record_dispatch_finished(termination: &'static str, elapsed: Duration) {
    counter!("streamer_dispatches_total", "termination" => termination).increment(1);
    histogram!("streamer_dispatch_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// What the aggregator needs to know about one finished dispatch
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub session_id: String,
    /// `exhausted`, `stopped`, `channel_closed` or `panicked`
    pub termination: &'static str,
    pub frames_sent: u64,
    pub item_errors: u64,
    pub elapsed: Duration,
}

/// Folds finished dispatches into a run summary
#[derive(Debug, Clone, Default)]
pub struct SessionMetricsAggregator {
    pub total_sessions: u64,
    pub total_frames: u64,
    pub total_item_errors: u64,
    pub terminations: HashMap<&'static str, u64>,
    pub frames_per_session: RunningStats,
    pub duration_ms: RunningStats,
}

impl SessionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, record: &DispatchRecord) {
        self.total_sessions += 1;
        self.total_frames += record.frames_sent;
        self.total_item_errors += record.item_errors;
        *self.terminations.entry(record.termination).or_insert(0) += 1;
        self.frames_per_session.push(record.frames_sent as f64);
        self.duration_ms
            .push(record.elapsed.as_secs_f64() * 1000.0);
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_sessions: self.total_sessions,
            total_frames: self.total_frames,
            total_item_errors: self.total_item_errors,
            stopped_rate: if self.total_sessions > 0 {
                self.terminations.get("stopped").copied().unwrap_or(0) as f64
                    / self.total_sessions as f64
                    * 100.0
            } else {
                0.0
            },
            terminations: self.terminations.clone(),
            frames_per_session: StatsSummary::from(&self.frames_per_session),
            duration_ms: StatsSummary::from(&self.duration_ms),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_sessions: u64,
    pub total_frames: u64,
    pub total_item_errors: u64,
    pub stopped_rate: f64,
    pub terminations: HashMap<&'static str, u64>,
    pub frames_per_session: StatsSummary,
    pub duration_ms: StatsSummary,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Session Metrics Summary ===")?;
        writeln!(f, "Sessions: {}", self.total_sessions)?;
        writeln!(f, "Frames sent: {}", self.total_frames)?;
        writeln!(f, "Item errors: {}", self.total_item_errors)?;
        writeln!(f, "Stopped by request: {:.2}%", self.stopped_rate)?;
        writeln!(f, "Frames per session: {}", self.frames_per_session)?;
        writeln!(f, "Dispatch duration (ms): {}", self.duration_ms)?;

        if !self.terminations.is_empty() {
            let mut reasons: Vec<_> = self.terminations.iter().collect();
            reasons.sort();
            writeln!(f, "Terminations:")?;
            for (reason, count) in reasons {
                writeln!(f, "  {}: {}", reason, count)?;
            }
        }

        Ok(())
    }
}

/// Summary of one `RunningStats`
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online mean/variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(termination: &'static str, frames: u64, ms: u64) -> DispatchRecord {
        DispatchRecord {
            session_id: "s".to_string(),
            termination,
            frames_sent: frames,
            item_errors: 0,
            elapsed: Duration::from_millis(ms),
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SessionMetricsAggregator::new();
        aggregator.update(&record("exhausted", 10, 100));
        aggregator.update(&record("stopped", 4, 50));

        let summary = aggregator.summary();
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.total_frames, 14);
        assert_eq!(summary.terminations.get("stopped"), Some(&1));
        assert!((summary.stopped_rate - 50.0).abs() < 1e-10);
        assert!((summary.frames_per_session.mean - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SessionMetricsAggregator::new();
        aggregator.update(&record("exhausted", 3, 10));

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Sessions: 1"));
        assert!(output.contains("exhausted: 1"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_channel_opened();
        record_frame_sent("data", true);
        record_channel_closed("complete", Duration::from_millis(1));
    }
}
