//! # Session
//!
//! Push channel lifecycle.
//!
//! Responsibilities:
//! - Keep the session id to channel mapping (`SessionRegistry`)
//! - Record cooperative stop requests with a TTL (`StopSignalStore`)
//! - Own one writer task per channel and run its state machine (`ChannelHandle`)
//! - Expose the caller-facing API (`SessionManager`)

pub mod error;
pub mod handle;
pub mod manager;
pub mod registry;
pub mod stop_signal;
pub mod transports;

pub use contracts::{ChannelState, DataFrame, LifecycleEvent, Payload, SendError, SessionId};
pub use error::SessionError;
pub use handle::{ChannelHandle, ChannelOptions, DEFAULT_QUEUE_CAPACITY};
pub use manager::{SessionManager, SEND_ONCE_TIMEOUT};
pub use registry::SessionRegistry;
pub use stop_signal::{StopSignalStore, DEFAULT_STOP_SIGNAL_TTL};
pub use transports::{
    ChannelTransport, FailureKind, LogTransport, RecordedFrames, RecordingTransport,
    WriterTransport,
};
