//! Demo orchestrator - opens sessions, wires producers and collects summaries.
//!
//! Each session gets a recording transport, an upstream producer task
//! feeding an mpsc queue, and a dispatcher pulling from that queue. The
//! producer is attached as the session's upstream, so completing the channel
//! (stop, timeout) aborts it.

use std::time::Duration;

use contracts::StreamerConfig;
use dispatcher::{BufferedDispatcher, DispatchSummary, Dispatcher};
use futures::stream::{self, Stream};
use observability::DispatchRecord;
use session::{RecordedFrames, RecordingTransport, SessionManager};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::DemoStats;
use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct DemoConfig {
    pub streamer: StreamerConfig,

    pub sessions: usize,

    /// Items each producer emits before running dry
    pub items: usize,

    pub item_interval: Duration,

    /// Stop every other session after this delay
    pub stop_after: Option<Duration>,

    pub buffered: bool,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Demo {
    config: DemoConfig,
    manager: SessionManager,
}

impl Demo {
    pub fn new(config: DemoConfig) -> Self {
        let manager = SessionManager::new(config.streamer.clone());
        Self { config, manager }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    /// Run every session to completion
    pub async fn run(self) -> Result<DemoStats> {
        if self.config.sessions == 0 {
            return Err(CliError::demo_setup("at least one session is required"));
        }

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port).map_err(CliError::Metrics)?;
            info!(port, "Metrics endpoint available");
        }

        let started = Instant::now();
        let stop_signals = self.manager.stop_signals();
        let janitor = stop_signals.spawn_janitor(stop_signals.ttl());

        let mut dispatches = JoinSet::new();
        let recordings: Vec<RecordedFrames> = (0..self.config.sessions)
            .map(|index| self.open_session(index, &mut dispatches))
            .collect();

        info!(
            sessions = self.config.sessions,
            items = self.config.items,
            buffered = self.config.buffered,
            "Demo sessions running"
        );

        let stopper = self.config.stop_after.map(|delay| {
            let manager = self.manager.clone();
            let ids: Vec<String> = (0..self.config.sessions)
                .step_by(2)
                .map(session_name)
                .collect();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for id in ids {
                    manager.request_stop(id);
                }
            })
        });

        let mut stats = DemoStats {
            sessions: self.config.sessions,
            ..Default::default()
        };

        while let Some(joined) = dispatches.join_next().await {
            match joined {
                Ok(summary) => {
                    debug!(
                        session_id = %summary.session_id,
                        termination = %summary.termination,
                        frames = summary.frames_sent,
                        "Session finished"
                    );
                    stats
                        .sessions_metrics
                        .update(&DispatchRecord::from(&summary));
                }
                Err(e) => {
                    warn!(error = %e, "Dispatch task failed");
                    stats.failed_tasks += 1;
                }
            }
        }

        if let Some(stopper) = stopper {
            stopper.abort();
        }
        janitor.abort();

        stats.frames_recorded = recordings.iter().map(RecordedFrames::len).sum();
        stats.duration = started.elapsed();

        info!(
            duration_ms = stats.duration.as_millis() as u64,
            frames = stats.frames_recorded,
            open_sessions = self.manager.registry().len(),
            "Demo finished"
        );

        Ok(stats)
    }

    fn open_session(
        &self,
        index: usize,
        dispatches: &mut JoinSet<DispatchSummary>,
    ) -> RecordedFrames {
        let id = session_name(index);
        let config = self.manager.config();

        let (transport, frames) = RecordingTransport::new(id.clone());
        let handle = self.manager.open_channel(id.clone(), transport);

        let (tx, rx) = mpsc::channel(config.session.queue_capacity);
        let producer = tokio::spawn(produce_tokens(
            tx,
            index,
            self.config.items,
            self.config.item_interval,
        ));
        self.manager
            .attach_upstream(id.clone(), producer.abort_handle());

        let stop_signals = self.manager.stop_signals().clone();
        let end_timestamp = config.dispatch.end_timestamp;

        if self.config.buffered {
            let dispatcher = BufferedDispatcher::new(
                handle,
                id,
                stop_signals,
                config.dispatch.buffer_threshold,
            )
            .end_timestamp(end_timestamp);
            dispatches.spawn(dispatcher.run(receiver_stream(rx)));
        } else {
            let dispatcher = Dispatcher::new(handle, id, stop_signals).end_timestamp(end_timestamp);
            dispatches.spawn(dispatcher.run(receiver_stream(rx)));
        }

        frames
    }
}

fn session_name(index: usize) -> String {
    format!("demo-{index}")
}

/// Synthetic upstream: a token per tick, with an empty poll every seventh slot
async fn produce_tokens(
    tx: mpsc::Sender<Option<String>>,
    session: usize,
    items: usize,
    interval: Duration,
) {
    for n in 0..items {
        let token = (n % 7 != 6).then(|| format!("s{session}-t{n} "));
        if tx.send(token).await.is_err() {
            break;
        }
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
}

fn receiver_stream<T>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Send + 'static,
{
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sessions: usize, items: usize) -> DemoConfig {
        DemoConfig {
            streamer: StreamerConfig::default(),
            sessions,
            items,
            item_interval: Duration::ZERO,
            stop_after: None,
            buffered: false,
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn test_all_sessions_exhaust() {
        let demo = Demo::new(config(3, 5));
        let manager = demo.manager().clone();

        let stats = demo.run().await.unwrap();
        let summary = stats.sessions_metrics.summary();

        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.terminations.get("exhausted"), Some(&3));
        // 5 data frames plus the end frame per session
        assert_eq!(stats.frames_recorded, 18);
        assert_eq!(stats.failed_tasks, 0);
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_empty_polls_are_skipped() {
        let stats = Demo::new(config(1, 14)).run().await.unwrap();

        // slots 6 and 13 are empty
        assert_eq!(stats.sessions_metrics.summary().total_frames, 12);
        assert_eq!(stats.frames_recorded, 13);
    }

    #[tokio::test]
    async fn test_buffered_sessions_batch_frames() {
        let mut config = config(2, 5);
        config.buffered = true;

        let stats = Demo::new(config).run().await.unwrap();

        // five short tokens fit in one flush, then the end frame
        assert_eq!(stats.frames_recorded, 4);
        assert_eq!(stats.sessions_metrics.summary().total_frames, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_every_other_session() {
        let mut config = config(4, 20);
        config.item_interval = Duration::from_millis(5);
        config.stop_after = Some(Duration::from_millis(22));

        let stats = Demo::new(config).run().await.unwrap();
        let summary = stats.sessions_metrics.summary();

        assert_eq!(summary.terminations.get("stopped"), Some(&2));
        assert_eq!(summary.terminations.get("exhausted"), Some(&2));
        assert!((summary.stopped_rate - 50.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_zero_sessions_rejected() {
        let err = Demo::new(config(0, 5)).run().await.unwrap_err();
        assert!(matches!(err, CliError::DemoSetup { .. }));
    }
}
