//! StopSignalStore - "this session asked to stop" flags with a short TTL
//!
//! Cancellation is cooperative: a stop request only records a flag, and the
//! dispatcher for that session consumes it at its next polling point.

use std::sync::Arc;
use std::time::Duration;

use contracts::SessionId;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default flag lifetime
pub const DEFAULT_STOP_SIGNAL_TTL: Duration = Duration::from_secs(16);

/// Time-bounded, single-consumer stop flags keyed by session id.
///
/// Cheap to clone; clones share the same map. Expiry is lazy: an entry older
/// than the TTL reads as absent even before it is physically evicted, so a
/// stale request can never cancel a later stream that reuses the id.
#[derive(Clone, Debug)]
pub struct StopSignalStore {
    flags: Arc<DashMap<SessionId, Instant>>,
    ttl: Duration,
}

impl StopSignalStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            flags: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Flag `session_id` for cancellation, overwriting any earlier flag.
    ///
    /// Always succeeds. If no dispatcher is polling the id the flag simply
    /// expires unread.
    pub fn request_stop(&self, session_id: impl Into<SessionId>) {
        let session_id = session_id.into();
        debug!(session_id = %session_id, "Stop signal set");
        self.flags.insert(session_id, Instant::now());
        observability::record_stop_requested();
    }

    /// Atomically check and clear the flag for `session_id`.
    ///
    /// Returns `true` at most once per `request_stop`, and never for a flag
    /// older than the TTL.
    pub fn consume_if_stopped(&self, session_id: &str) -> bool {
        match self.flags.remove(session_id) {
            Some((_, requested_at)) if requested_at.elapsed() < self.ttl => true,
            Some((id, requested_at)) => {
                trace!(
                    session_id = %id,
                    age_ms = requested_at.elapsed().as_millis() as u64,
                    "Discarded expired stop signal"
                );
                false
            }
            None => false,
        }
    }

    /// Physically drop expired flags. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.flags.len();
        let ttl = self.ttl;
        self.flags
            .retain(|_, requested_at| requested_at.elapsed() < ttl);
        before.saturating_sub(self.flags.len())
    }

    /// Number of flags currently stored, expired ones included
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Periodically purge expired flags until every clone of the store is dropped.
    pub fn spawn_janitor(&self, period: Duration) -> JoinHandle<()> {
        let flags = Arc::downgrade(&self.flags);
        let ttl = self.ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(flags) = flags.upgrade() else {
                    break;
                };
                flags.retain(|_, requested_at| requested_at.elapsed() < ttl);
            }
            debug!("Stop signal janitor stopped");
        })
    }
}

impl Default for StopSignalStore {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_SIGNAL_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_consumption() {
        let store = StopSignalStore::default();
        store.request_stop("stream-1");

        assert!(store.consume_if_stopped("stream-1"));
        assert!(!store.consume_if_stopped("stream-1"));
    }

    #[test]
    fn test_unknown_id_is_not_stopped() {
        let store = StopSignalStore::default();
        assert!(!store.consume_if_stopped("never-requested"));
    }

    #[test]
    fn test_ids_are_independent() {
        let store = StopSignalStore::default();
        store.request_stop("a");

        assert!(!store.consume_if_stopped("b"));
        assert!(store.consume_if_stopped("a"));
    }

    #[test]
    fn test_clones_share_flags() {
        let store = StopSignalStore::default();
        let clone = store.clone();
        clone.request_stop("shared");
        assert!(store.consume_if_stopped("shared"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_signal_expires() {
        let store = StopSignalStore::new(Duration::from_secs(16));
        store.request_stop("stale");

        tokio::time::advance(Duration::from_secs(17)).await;

        assert!(!store.consume_if_stopped("stale"));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerequest_refreshes_expiry() {
        let store = StopSignalStore::new(Duration::from_secs(10));
        store.request_stop("s");
        tokio::time::advance(Duration::from_secs(8)).await;
        store.request_stop("s");
        tokio::time::advance(Duration::from_secs(8)).await;

        assert!(store.consume_if_stopped("s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = StopSignalStore::new(Duration::from_secs(5));
        store.request_stop("old");
        tokio::time::advance(Duration::from_secs(6)).await;
        store.request_stop("fresh");

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.consume_if_stopped("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_janitor_evicts_and_exits() {
        let store = StopSignalStore::new(Duration::from_secs(1));
        let janitor = store.spawn_janitor(Duration::from_secs(2));
        store.request_stop("x");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.is_empty());

        drop(store);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(janitor.is_finished());
    }
}
