//! Transport implementations
//!
//! Contains ChannelTransport, WriterTransport, LogTransport and
//! RecordingTransport.

mod channel;
mod log;
mod memory;
mod writer;

pub use self::channel::ChannelTransport;
pub use self::log::LogTransport;
pub use self::memory::{FailureKind, RecordedFrames, RecordingTransport};
pub use self::writer::WriterTransport;
