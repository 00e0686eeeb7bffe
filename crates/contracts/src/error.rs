//! Layered error definitions
//!
//! Two families: `SendError` for everything that can go wrong on one channel,
//! `ContractError` for configuration and payload construction.

use std::io;

use thiserror::Error;

use crate::SessionId;

/// Failure writing to, or keeping open, one push channel.
///
/// Every variant is terminal for its own session only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SendError {
    /// The peer went away mid-write (tab closed, connection reset).
    #[error("session '{session_id}': client disconnected: {message}")]
    ClientDisconnected {
        session_id: SessionId,
        message: String,
    },

    /// Any other I/O failure on the underlying transport.
    #[error("session '{session_id}': transport error: {message}")]
    Transport {
        session_id: SessionId,
        message: String,
    },

    /// No terminal state was reached within the configured duration.
    #[error("session '{session_id}': timed out after {after_ms}ms")]
    Timeout { session_id: SessionId, after_ms: u64 },
}

impl SendError {
    pub fn client_disconnected(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::ClientDisconnected {
            session_id: session_id.clone(),
            message: message.into(),
        }
    }

    pub fn transport(session_id: &SessionId, message: impl Into<String>) -> Self {
        Self::Transport {
            session_id: session_id.clone(),
            message: message.into(),
        }
    }

    /// Classify an io error raised by a transport write.
    ///
    /// A broken pipe and its relatives mean the peer closed the connection;
    /// everything else is a genuine transport failure.
    pub fn from_io(session_id: &SessionId, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => Self::client_disconnected(session_id, err.to_string()),
            _ => Self::transport(session_id, err.to_string()),
        }
    }

    pub fn is_client_disconnect(&self) -> bool {
        matches!(self, Self::ClientDisconnected { .. })
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::ClientDisconnected { session_id, .. }
            | Self::Transport { session_id, .. }
            | Self::Timeout { session_id, .. } => session_id,
        }
    }
}

/// Configuration and payload errors
#[derive(Debug, Error)]
pub enum ContractError {
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// A payload could not be serialized to text
    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ContractError {
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broken_pipe_is_disconnect() {
        let id = SessionId::new("s");
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "Broken pipe");
        let classified = SendError::from_io(&id, &err);
        assert!(classified.is_client_disconnect());
        assert_eq!(classified.session_id(), &id);
    }

    #[test]
    fn test_other_io_is_transport() {
        let id = SessionId::new("s");
        let err = io::Error::other("disk on fire");
        assert!(matches!(
            SendError::from_io(&id, &err),
            SendError::Transport { .. }
        ));
    }

    #[test]
    fn test_display_carries_session() {
        let err = SendError::Timeout {
            session_id: "abc".into(),
            after_ms: 500,
        };
        assert_eq!(err.to_string(), "session 'abc': timed out after 500ms");
    }
}
