//! Session error types

use contracts::{ContractError, SendError, SessionId};
use thiserror::Error;

/// Errors from the caller-facing session API
#[derive(Debug, Error)]
pub enum SessionError {
    /// No open channel under this id
    #[error("session '{0}' is not registered")]
    UnknownSession(SessionId),

    /// A payload supplier failed before anything was sent
    #[error("payload supplier failed: {0}")]
    Supplier(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Channel write failure
    #[error(transparent)]
    Send(#[from] SendError),

    /// Payload could not be built
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SessionError {
    pub fn supplier(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Supplier(err.into())
    }
}
