//! Dispatcher error types

use contracts::{SendError, SessionId};
use thiserror::Error;

/// Boxed error returned by user transforms
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One stream item could not be delivered.
///
/// Never returned from a dispatch run; handed to the item-error hook and
/// the loop moves on to the next item.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The per-item transform failed
    #[error("session '{session_id}': transform failed: {source}")]
    Transform {
        session_id: SessionId,
        #[source]
        source: BoxError,
    },

    /// Writing the transformed item failed
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// Writing an accumulated buffer failed
    #[error("session '{session_id}': buffer flush failed: {source}")]
    Flush {
        session_id: SessionId,
        #[source]
        source: SendError,
    },

    /// The producer or a hook panicked; the stream was still closed
    #[error("session '{session_id}': dispatch panicked: {message}")]
    Panicked {
        session_id: SessionId,
        message: String,
    },
}

impl DispatchError {
    pub fn transform(session_id: &SessionId, source: impl Into<BoxError>) -> Self {
        Self::Transform {
            session_id: session_id.clone(),
            source: source.into(),
        }
    }

    /// Whether the underlying cause is the client going away
    pub fn is_client_disconnect(&self) -> bool {
        match self {
            Self::Send(e) | Self::Flush { source: e, .. } => e.is_client_disconnect(),
            _ => false,
        }
    }
}
