//! WriterTransport - SSE text over any tokio writer
//!
//! Typically the write half of a TCP stream already past its HTTP headers.

use contracts::{DataFrame, SendError, SessionId, Transport};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};

pub struct WriterTransport<W> {
    name: String,
    writer: W,
    bytes_written: u64,
}

impl<W> WriterTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(name: impl Into<String>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Transport for WriterTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "writer_transport_write",
        skip(self, session_id, frame),
        fields(session_id = %session_id, event = %frame.event())
    )]
    async fn write(&mut self, session_id: &SessionId, frame: &DataFrame) -> Result<(), SendError> {
        let wire = frame.to_sse();
        self.writer
            .write_all(wire.as_bytes())
            .await
            .map_err(|e| SendError::from_io(session_id, &e))?;
        // Flush per frame so the client sees each event immediately.
        self.writer
            .flush()
            .await
            .map_err(|e| SendError::from_io(session_id, &e))?;
        self.bytes_written += wire.len() as u64;
        Ok(())
    }

    #[instrument(
        name = "writer_transport_close",
        skip(self, session_id),
        fields(session_id = %session_id)
    )]
    async fn close(&mut self, session_id: &SessionId) -> Result<(), SendError> {
        if let Err(e) = self.writer.shutdown().await {
            warn!(transport = %self.name, error = %e, "Writer shutdown failed");
            return Err(SendError::from_io(session_id, &e));
        }
        debug!(
            transport = %self.name,
            bytes = self.bytes_written,
            "WriterTransport closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// Writer whose peer has hung up
    struct HungUp;

    impl AsyncWrite for HungUp {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_writes_sse_text() {
        let mut transport = WriterTransport::new("buf", Vec::new());
        let id = SessionId::new("s1");

        transport
            .write(&id, &DataFrame::new("token", "a\nb"))
            .await
            .unwrap();
        transport.write(&id, &DataFrame::end_at(7)).await.unwrap();

        let text = String::from_utf8(transport.into_inner()).unwrap();
        assert_eq!(
            text,
            "event: token\ndata: a\ndata: b\n\nevent: end\ndata: {\"end\":true,\"timestamp\":7}\n\n"
        );
    }

    #[tokio::test]
    async fn test_broken_pipe_is_disconnect() {
        let mut transport = WriterTransport::new("gone", HungUp);
        let err = transport
            .write(&SessionId::new("s1"), &DataFrame::data("x"))
            .await
            .unwrap_err();
        assert!(err.is_client_disconnect());
    }
}
