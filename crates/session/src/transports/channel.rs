//! ChannelTransport - SSE bytes into an mpsc receiver
//!
//! The receiving half is what an HTTP framework's streaming response body
//! polls; dropping it is how the framework reports a gone client.

use bytes::Bytes;
use contracts::{DataFrame, SendError, SessionId, Transport};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

pub struct ChannelTransport {
    name: String,
    tx: mpsc::Sender<Bytes>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its encoded frames arrive on
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: "channel".to_string(),
                tx,
            },
            rx,
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "channel_transport_write",
        skip(self, session_id, frame),
        fields(session_id = %session_id, event = %frame.event())
    )]
    async fn write(&mut self, session_id: &SessionId, frame: &DataFrame) -> Result<(), SendError> {
        self.tx
            .send(frame.to_sse_bytes())
            .await
            .map_err(|_| SendError::client_disconnected(session_id, "response body dropped"))
    }

    async fn close(&mut self, session_id: &SessionId) -> Result<(), SendError> {
        debug!(transport = %self.name, session_id = %session_id, "ChannelTransport closed");
        Ok(())
    }
}
