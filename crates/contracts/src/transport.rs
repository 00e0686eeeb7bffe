//! Transport trait - the seam to the HTTP layer
//!
//! The core never speaks HTTP. Whatever accepts the request hands the core a
//! `Transport` and the core pushes frames into it.

use crate::{DataFrame, SendError, SessionId};

/// Server-to-client frame writer
///
/// Implementations must report a peer disconnect as
/// `SendError::ClientDisconnected` so the handle can log it at low severity.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Transport name (used for logging)
    fn name(&self) -> &str;

    /// Write one frame to the peer.
    ///
    /// # Errors
    /// `ClientDisconnected` when the peer closed the connection,
    /// `Transport` for any other failure.
    async fn write(&mut self, session_id: &SessionId, frame: &DataFrame) -> Result<(), SendError>;

    /// Release the connection. Called once, after the last write.
    async fn close(&mut self, session_id: &SessionId) -> Result<(), SendError>;
}
