//! BufferedDispatcher - fewer, larger writes
//!
//! Transformed items are appended to a text buffer that is flushed as one
//! `data` frame whenever it reaches the byte threshold, and once more before
//! the terminal frame so nothing buffered is dropped on exit.

use std::sync::Arc;

use contracts::{EndTimestampMode, Payload, SessionId};
use futures::Stream;
use session::{ChannelHandle, SessionManager, StopSignalStore};
use tokio::task::JoinHandle;

use crate::engine::{BufferHook, DispatchCore, DispatchSummary, FrameBuffer, Output};
use crate::error::{BoxError, DispatchError};
use crate::metrics::DispatchMetrics;

pub struct BufferedDispatcher<T> {
    core: DispatchCore<T>,
    buffer: FrameBuffer,
}

impl<T> BufferedDispatcher<T>
where
    T: Into<Payload> + Send + 'static,
{
    pub fn new(
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
        stop_signals: StopSignalStore,
        threshold: usize,
    ) -> Self {
        Self::with_transform(handle, session_id, stop_signals, threshold, |item: T| {
            Ok(item.into())
        })
    }
}

impl<T> BufferedDispatcher<T>
where
    T: Send + 'static,
{
    pub fn with_transform<F>(
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
        stop_signals: StopSignalStore,
        threshold: usize,
        transform: F,
    ) -> Self
    where
        F: FnMut(T) -> Result<Payload, BoxError> + Send + 'static,
    {
        let core = DispatchCore::new(handle, session_id.into(), stop_signals, Box::new(transform));
        Self::from_core(core, threshold)
    }

    pub(crate) fn from_core(core: DispatchCore<T>, threshold: usize) -> Self {
        Self {
            core,
            buffer: FrameBuffer::new(threshold),
        }
    }

    pub fn threshold(&self) -> usize {
        self.buffer.threshold()
    }

    /// Called with the buffered content right before each flush is sent
    pub fn on_buffer_ready<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.buffer.set_on_ready(Box::new(hook));
        self
    }

    pub fn on_item_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&DispatchError) + Send + 'static,
    {
        self.core.on_item_error = Some(Box::new(hook));
        self
    }

    pub fn before_process<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.core.before_process = Some(Box::new(hook));
        self
    }

    pub fn after_process<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Payload) + Send + 'static,
    {
        self.core.after_process = Some(Box::new(hook));
        self
    }

    pub fn end_timestamp(mut self, mode: EndTimestampMode) -> Self {
        self.core.end_timestamp = mode;
        self
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.core.metrics)
    }

    pub async fn run<S>(self, producer: S) -> DispatchSummary
    where
        S: Stream<Item = Option<T>>,
    {
        self.core
            .drive(Output::Buffered(self.buffer), producer)
            .await
    }

    pub fn spawn<S>(self, producer: S) -> JoinHandle<()>
    where
        S: Stream<Item = Option<T>> + Send + 'static,
    {
        tokio::spawn(async move {
            self.run(producer).await;
        })
    }
}

/// Buffered dispatch with the identity transform.
///
/// `buffer_threshold` counts bytes of text.
pub async fn dispatch_buffered<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
    buffer_threshold: usize,
    on_buffer_ready: Option<BufferHook>,
) -> DispatchSummary
where
    T: Into<Payload> + Send + 'static,
    S: Stream<Item = Option<T>>,
{
    configured(manager, handle, session_id, buffer_threshold, on_buffer_ready)
        .run(producer)
        .await
}

/// `dispatch_buffered` on its own task
pub fn spawn_dispatch_buffered<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
    buffer_threshold: usize,
    on_buffer_ready: Option<BufferHook>,
) -> JoinHandle<()>
where
    T: Into<Payload> + Send + 'static,
    S: Stream<Item = Option<T>> + Send + 'static,
{
    configured(manager, handle, session_id, buffer_threshold, on_buffer_ready).spawn(producer)
}

fn configured<T>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    buffer_threshold: usize,
    on_buffer_ready: Option<BufferHook>,
) -> BufferedDispatcher<T>
where
    T: Into<Payload> + Send + 'static,
{
    let mut dispatcher = BufferedDispatcher::new(
        handle,
        session_id,
        manager.stop_signals().clone(),
        buffer_threshold,
    )
    .end_timestamp(manager.config().dispatch.end_timestamp);
    if let Some(hook) = on_buffer_ready {
        dispatcher.buffer.set_on_ready(hook);
    }
    dispatcher
}
