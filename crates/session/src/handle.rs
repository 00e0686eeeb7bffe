//! ChannelHandle - one open push channel with an isolated writer task
//!
//! Frames are queued to a per-channel worker that owns the transport, so a
//! slow client only ever stalls its own session. Lifecycle is an atomic state
//! machine driven through [`ChannelHandle::transition`].

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use contracts::{ChannelState, DataFrame, LifecycleEvent, SendError, SessionId, Transport};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::registry::RegistryShared;

/// Default outbound queue depth per channel
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Per-channel settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Force the timeout path if no terminal state is reached in time
    pub timeout: Option<Duration>,
    /// Frames queued before `send` waits for the writer
    pub queue_capacity: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ChannelOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

struct Outbound {
    frame: DataFrame,
    ack: oneshot::Sender<Result<(), SendError>>,
}

struct RegistryBinding {
    registry: Weak<RegistryShared>,
    key: SessionId,
}

struct Inner {
    session_id: SessionId,
    transport_name: String,
    state: AtomicU8,
    timeout: Option<Duration>,
    tx: mpsc::Sender<Outbound>,
    closed_tx: watch::Sender<bool>,
    /// Registry entries pointing at this handle, released on close
    registrations: Mutex<Vec<RegistryBinding>>,
    cause: OnceLock<LifecycleEvent>,
    frames_sent: AtomicU64,
    opened_at: Instant,
}

/// Handle to one push channel.
///
/// Cloning is cheap and every clone drives the same channel. Terminal
/// operations may race freely from the dispatcher, error callbacks and the
/// timeout timer; exactly one of them wins.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<Inner>,
}

impl ChannelHandle {
    /// Create the handle and spawn its writer task (and timer, if any).
    ///
    /// The handle is not registered anywhere; see
    /// [`SessionRegistry::open_channel`](crate::SessionRegistry::open_channel).
    pub fn open<T>(id: impl Into<SessionId>, transport: T, options: ChannelOptions) -> Self
    where
        T: Transport + Send + 'static,
    {
        let session_id = id.into();
        let transport_name = transport.name().to_string();
        let (tx, rx) = mpsc::channel(options.queue_capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(false);

        let handle = Self {
            inner: Arc::new(Inner {
                session_id: session_id.clone(),
                transport_name,
                state: AtomicU8::new(ChannelState::Open as u8),
                timeout: options.timeout,
                tx,
                closed_tx,
                registrations: Mutex::new(Vec::new()),
                cause: OnceLock::new(),
                frames_sent: AtomicU64::new(0),
                opened_at: Instant::now(),
            }),
        };

        tokio::spawn(channel_worker(transport, rx, closed_rx, session_id));
        if let Some(timeout) = options.timeout {
            handle.spawn_timer(timeout);
        }

        observability::record_channel_opened();
        debug!(
            session_id = %handle.inner.session_id,
            transport = %handle.inner.transport_name,
            timeout_ms = options.timeout.map(|t| t.as_millis() as u64),
            "Channel opened"
        );
        handle
    }

    pub fn session_id(&self) -> &SessionId {
        &self.inner.session_id
    }

    pub fn transport_name(&self) -> &str {
        &self.inner.transport_name
    }

    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Frames the transport accepted
    pub fn frames_sent(&self) -> u64 {
        self.inner.frames_sent.load(Ordering::Relaxed)
    }

    /// The event that closed the channel, once it has closed
    pub fn close_reason(&self) -> Option<&LifecycleEvent> {
        self.inner.cause.get()
    }

    /// Whether two handles drive the same channel
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write one frame.
    ///
    /// A no-op on a handle that is no longer open. A transport failure closes
    /// the channel before the error is returned: a disconnect completes it,
    /// anything else completes it with an error.
    pub async fn send(&self, frame: DataFrame) -> Result<(), SendError> {
        if !self.is_open() {
            trace!(
                session_id = %self.inner.session_id,
                event = %frame.event(),
                "Send on closed channel ignored"
            );
            return Ok(());
        }

        let (ack, ack_rx) = oneshot::channel();
        if self.inner.tx.send(Outbound { frame, ack }).await.is_err() {
            return Ok(());
        }

        match ack_rx.await {
            Ok(Ok(())) => {
                self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(err)) => {
                self.close_on_failure(&err);
                Err(err)
            }
            // The channel closed while the frame was still queued.
            Err(_) => Ok(()),
        }
    }

    /// Graceful close. Idempotent.
    pub fn complete(&self) -> bool {
        self.transition(LifecycleEvent::Complete)
    }

    /// Abnormal close. Idempotent.
    pub fn complete_with_error(&self, cause: impl Into<String>) -> bool {
        self.transition(LifecycleEvent::Error(cause.into()))
    }

    /// Timer expiry; runs the same cleanup as `complete`.
    pub fn on_timeout(&self) -> bool {
        self.transition(LifecycleEvent::Timeout)
    }

    /// Single entry point of the lifecycle state machine.
    ///
    /// Returns `true` for the one call that moved the channel out of `Open`;
    /// every later call is a no-op returning `false`.
    pub fn transition(&self, event: LifecycleEvent) -> bool {
        let intermediate = event.intermediate_state();
        if self
            .inner
            .state
            .compare_exchange(
                ChannelState::Open as u8,
                intermediate as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            trace!(
                session_id = %self.inner.session_id,
                event = ?event,
                state = %self.state(),
                "Channel already closing"
            );
            return false;
        }

        match &event {
            LifecycleEvent::Complete => {
                debug!(session_id = %self.inner.session_id, "Channel completed");
            }
            LifecycleEvent::Error(cause) => {
                warn!(session_id = %self.inner.session_id, cause = %cause, "Channel closed with error");
            }
            LifecycleEvent::Timeout => {
                warn!(
                    session_id = %self.inner.session_id,
                    timeout_ms = self.inner.timeout.map(|t| t.as_millis() as u64),
                    "Channel timed out"
                );
            }
        }

        let bindings = std::mem::take(&mut *self.bindings());
        for binding in bindings {
            if let Some(registry) = binding.registry.upgrade() {
                registry.release(&binding.key, self);
            }
        }

        let reason = event.reason();
        let _ = self.inner.cause.set(event);
        self.inner
            .state
            .store(ChannelState::Closed as u8, Ordering::Release);
        self.inner.closed_tx.send_replace(true);

        observability::record_channel_closed(reason, self.inner.opened_at.elapsed());
        true
    }

    /// Resolves once the channel has reached `Closed`.
    pub async fn closed(&self) {
        wait_closed(&mut self.inner.closed_tx.subscribe()).await;
    }

    /// Remember that `registry` maps `key` to this handle, so closing the
    /// channel releases that entry.
    pub(crate) fn bind_registry(&self, registry: Weak<RegistryShared>, key: SessionId) {
        let mut bindings = self.bindings();
        let known = bindings
            .iter()
            .any(|binding| binding.key == key && binding.registry.ptr_eq(&registry));
        if !known {
            bindings.push(RegistryBinding { registry, key });
        }
    }

    fn bindings(&self) -> MutexGuard<'_, Vec<RegistryBinding>> {
        self.inner
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn close_on_failure(&self, err: &SendError) {
        match err {
            SendError::ClientDisconnected { message, .. } => {
                info!(session_id = %self.inner.session_id, reason = %message, "Client disconnected");
                self.complete();
            }
            SendError::Transport { message, .. } => {
                error!(session_id = %self.inner.session_id, error = %message, "Transport write failed");
                self.complete_with_error(message.clone());
            }
            SendError::Timeout { .. } => {
                self.on_timeout();
            }
        }
    }

    fn spawn_timer(&self, timeout: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let mut closed_rx = self.inner.closed_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(timeout) => {
                    if let Some(inner) = weak.upgrade() {
                        ChannelHandle { inner }.on_timeout();
                    }
                }
                _ = wait_closed(&mut closed_rx) => {}
            }
        });
    }
}

impl fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("session_id", &self.inner.session_id)
            .field("transport", &self.inner.transport_name)
            .field("state", &self.state())
            .field("frames_sent", &self.frames_sent())
            .finish()
    }
}

/// Resolves when the closed flag is set or its sender is gone.
async fn wait_closed(closed_rx: &mut watch::Receiver<bool>) {
    let _ = closed_rx.wait_for(|closed| *closed).await;
}

/// Writer task: drains the queue into the transport until the channel closes
/// or every handle is dropped, then closes the transport.
#[instrument(
    name = "channel_worker_loop",
    skip(transport, rx, closed_rx, session_id),
    fields(session_id = %session_id)
)]
async fn channel_worker<T: Transport>(
    mut transport: T,
    mut rx: mpsc::Receiver<Outbound>,
    mut closed_rx: watch::Receiver<bool>,
    session_id: SessionId,
) {
    trace!(transport = %transport.name(), "Channel worker started");

    loop {
        tokio::select! {
            biased;
            _ = wait_closed(&mut closed_rx) => break,
            outbound = rx.recv() => {
                let Some(Outbound { frame, ack }) = outbound else {
                    break;
                };
                let result = transport.write(&session_id, &frame).await;
                observability::record_frame_sent(frame.event().as_str(), result.is_ok());
                let _ = ack.send(result);
            }
        }
    }

    if let Err(e) = transport.close(&session_id).await {
        debug!(error = %e, "Transport close failed");
    }
    trace!("Channel worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::{FailureKind, RecordingTransport};

    fn open_recording(timeout: Option<Duration>) -> (ChannelHandle, crate::RecordedFrames) {
        let (transport, frames) = RecordingTransport::new("mem");
        let handle = ChannelHandle::open(
            "s1",
            transport,
            ChannelOptions::default().with_timeout(timeout),
        );
        (handle, frames)
    }

    #[tokio::test]
    async fn test_send_in_order() {
        let (handle, frames) = open_recording(None);
        for text in ["a", "b", "c"] {
            handle.send(DataFrame::data(text)).await.unwrap();
        }

        assert_eq!(frames.data(), vec!["a", "b", "c"]);
        assert_eq!(handle.frames_sent(), 3);
    }

    #[tokio::test]
    async fn test_complete_is_idempotent() {
        let (handle, _frames) = open_recording(None);

        assert!(handle.complete());
        assert!(!handle.complete());
        assert!(!handle.complete_with_error("late"));
        assert!(!handle.on_timeout());

        assert_eq!(handle.state(), ChannelState::Closed);
        assert_eq!(handle.close_reason(), Some(&LifecycleEvent::Complete));
    }

    #[tokio::test]
    async fn test_concurrent_terminations_close_once() {
        let (handle, _frames) = open_recording(None);
        let mut tasks = Vec::new();
        for i in 0..16 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    handle.complete()
                } else {
                    handle.complete_with_error("boom")
                }
            }));
        }

        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(handle.state().is_closed());
    }

    #[tokio::test]
    async fn test_send_after_close_is_noop() {
        let (handle, frames) = open_recording(None);
        handle.complete();

        assert!(handle.send(DataFrame::data("late")).await.is_ok());
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn test_transport_closed_after_complete() {
        let (handle, frames) = open_recording(None);
        handle.send(DataFrame::data("x")).await.unwrap();
        handle.complete();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !frames.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_completes_channel() {
        let (transport, frames) = RecordingTransport::new("mem");
        let transport = transport.fail_after(1, FailureKind::Disconnect);
        let handle = ChannelHandle::open("s1", transport, ChannelOptions::default());

        handle.send(DataFrame::data("ok")).await.unwrap();
        let err = handle.send(DataFrame::data("lost")).await.unwrap_err();

        assert!(err.is_client_disconnect());
        assert_eq!(handle.close_reason(), Some(&LifecycleEvent::Complete));
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_errors_channel() {
        let (transport, _frames) = RecordingTransport::new("mem");
        let transport = transport.fail_after(0, FailureKind::Transport);
        let handle = ChannelHandle::open("s1", transport, ChannelOptions::default());

        let err = handle.send(DataFrame::data("x")).await.unwrap_err();
        assert!(matches!(err, SendError::Transport { .. }));
        assert!(matches!(
            handle.close_reason(),
            Some(LifecycleEvent::Error(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires() {
        let (handle, _frames) = open_recording(Some(Duration::from_secs(5)));

        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(handle.state().is_closed());
        assert_eq!(handle.close_reason(), Some(&LifecycleEvent::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_ignored_after_complete() {
        let (handle, _frames) = open_recording(Some(Duration::from_secs(5)));
        handle.complete();

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handle.close_reason(), Some(&LifecycleEvent::Complete));
    }

    #[tokio::test]
    async fn test_closed_resolves() {
        let (handle, _frames) = open_recording(None);
        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.closed().await })
        };

        handle.complete_with_error("stop");
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
