//! Per-dispatch counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatch run, readable while it is still looping
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    items_pulled: AtomicU64,
    skipped: AtomicU64,
    item_errors: AtomicU64,
    flushes: AtomicU64,
    flushed_bytes: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Items pulled from the producer, empty ones included
    pub fn items_pulled(&self) -> u64 {
        self.items_pulled.load(Ordering::Relaxed)
    }

    pub fn inc_items_pulled(&self) {
        self.items_pulled.fetch_add(1, Ordering::Relaxed);
    }

    /// Empty items skipped without error
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_errors(&self) -> u64 {
        self.item_errors.load(Ordering::Relaxed)
    }

    pub fn inc_item_errors(&self) {
        self.item_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn flushed_bytes(&self) -> u64 {
        self.flushed_bytes.load(Ordering::Relaxed)
    }

    pub fn record_flush(&self, bytes: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            items_pulled: self.items_pulled(),
            skipped: self.skipped(),
            item_errors: self.item_errors(),
            flushes: self.flushes(),
            flushed_bytes: self.flushed_bytes(),
        }
    }
}

/// Point-in-time copy of [`DispatchMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub items_pulled: u64,
    pub skipped: u64,
    pub item_errors: u64,
    pub flushes: u64,
    pub flushed_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_snapshot() {
        let metrics = DispatchMetrics::new();
        metrics.inc_items_pulled();
        metrics.inc_items_pulled();
        metrics.inc_skipped();
        metrics.record_flush(100);
        metrics.record_flush(50);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.items_pulled, 2);
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.flushes, 2);
        assert_eq!(snapshot.flushed_bytes, 150);
        assert_eq!(snapshot.item_errors, 0);
    }
}
