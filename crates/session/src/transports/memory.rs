//! RecordingTransport - keeps every frame in memory
//!
//! The test double for anything above the transport seam. It can be scripted
//! to fail after N successful writes and to delay each write.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{DataFrame, EventName, SendError, SessionId, Transport};
use tracing::debug;

/// Failure injected by [`RecordingTransport::fail_after`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Behave like a client that closed the connection
    Disconnect,
    /// Behave like any other I/O failure
    Transport,
}

#[derive(Debug, Default)]
struct Recording {
    frames: Vec<DataFrame>,
    closed: bool,
}

/// Inspection side of a [`RecordingTransport`]
#[derive(Debug, Clone, Default)]
pub struct RecordedFrames {
    inner: Arc<Mutex<Recording>>,
}

impl RecordedFrames {
    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn frames(&self) -> Vec<DataFrame> {
        self.lock().frames.clone()
    }

    /// Event names in write order
    pub fn events(&self) -> Vec<String> {
        self.lock()
            .frames
            .iter()
            .map(|frame| frame.event().as_str().to_string())
            .collect()
    }

    /// Payloads of the `data` frames in write order
    pub fn data(&self) -> Vec<String> {
        self.lock()
            .frames
            .iter()
            .filter(|frame| frame.event() == &EventName::Data)
            .map(|frame| frame.data_str().to_string())
            .collect()
    }

    pub fn last(&self) -> Option<DataFrame> {
        self.lock().frames.last().cloned()
    }

    /// Number of terminal `end` frames written
    pub fn end_count(&self) -> usize {
        self.lock()
            .frames
            .iter()
            .filter(|frame| frame.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Whether the channel worker closed the transport
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

pub struct RecordingTransport {
    name: String,
    recorded: RecordedFrames,
    fail_after: Option<(usize, FailureKind)>,
    delay: Option<Duration>,
    writes: usize,
}

impl RecordingTransport {
    pub fn new(name: impl Into<String>) -> (Self, RecordedFrames) {
        let recorded = RecordedFrames::default();
        (
            Self {
                name: name.into(),
                recorded: recorded.clone(),
                fail_after: None,
                delay: None,
                writes: 0,
            },
            recorded,
        )
    }

    /// Accept `successes` writes, then fail every later one with `kind`.
    pub fn fail_after(mut self, successes: usize, kind: FailureKind) -> Self {
        self.fail_after = Some((successes, kind));
        self
    }

    /// Sleep before each write, like a slow client.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, session_id: &SessionId, frame: &DataFrame) -> Result<(), SendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((successes, kind)) = self.fail_after {
            if self.writes >= successes {
                return Err(match kind {
                    FailureKind::Disconnect => {
                        SendError::client_disconnected(session_id, "broken pipe")
                    }
                    FailureKind::Transport => SendError::transport(session_id, "injected failure"),
                });
            }
        }

        self.writes += 1;
        self.recorded.lock().frames.push(frame.clone());
        Ok(())
    }

    async fn close(&mut self, session_id: &SessionId) -> Result<(), SendError> {
        self.recorded.lock().closed = true;
        debug!(transport = %self.name, session_id = %session_id, "RecordingTransport closed");
        Ok(())
    }
}
