//! # Dispatcher
//!
//! Drives a producer of optional items into a session channel.
//!
//! - `Dispatcher` sends one `data` frame per item
//! - `BufferedDispatcher` batches items into byte-threshold flushes
//! - `StreamProcessor` is the fluent front for both
//!
//! Every run ends with an `end` frame and a completed channel, whether the
//! producer ran dry, a stop was requested, or the producer panicked.

pub mod buffered;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod processor;

pub use buffered::{dispatch_buffered, spawn_dispatch_buffered, BufferedDispatcher};
pub use dispatcher::{dispatch, dispatch_with, spawn_dispatch, spawn_dispatch_with, Dispatcher};
pub use engine::{
    AfterHook, BeforeHook, BufferHook, DispatchSummary, ItemErrorHook, Termination, TransformFn,
};
pub use error::{BoxError, DispatchError};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use processor::StreamProcessor;
