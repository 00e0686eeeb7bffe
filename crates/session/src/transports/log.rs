//! LogTransport - logs frame summaries via tracing

use contracts::{DataFrame, SendError, SessionId, Transport};
use tracing::{info, instrument};

/// Transport that only logs, for debugging a producer without a client
pub struct LogTransport {
    name: String,
    frames: u64,
}

impl LogTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: 0,
        }
    }
}

impl Transport for LogTransport {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_transport_write",
        skip(self, session_id, frame),
        fields(transport = %self.name, session_id = %session_id)
    )]
    async fn write(&mut self, session_id: &SessionId, frame: &DataFrame) -> Result<(), SendError> {
        self.frames += 1;
        info!(
            event = %frame.event(),
            bytes = frame.data_str().len(),
            seq = self.frames,
            "DataFrame sent"
        );
        Ok(())
    }

    #[instrument(name = "log_transport_close", skip(self))]
    async fn close(&mut self, session_id: &SessionId) -> Result<(), SendError> {
        info!(transport = %self.name, session_id = %session_id, frames = self.frames, "LogTransport closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_transport_write() {
        let mut transport = LogTransport::new("test_log");
        let id = SessionId::new("s1");

        assert!(transport.write(&id, &DataFrame::data("x")).await.is_ok());
        assert!(transport.close(&id).await.is_ok());
        assert_eq!(transport.frames, 1);
    }
}
