//! Dispatcher - drives a producer into one channel, one frame per item

use std::sync::Arc;

use contracts::{EndTimestampMode, Payload, SessionId};
use futures::Stream;
use session::{ChannelHandle, SessionManager, StopSignalStore};
use tokio::task::JoinHandle;

use crate::buffered::BufferedDispatcher;
use crate::engine::{DispatchCore, DispatchSummary, ItemErrorHook, Output, TransformFn};
use crate::error::{BoxError, DispatchError};
use crate::metrics::DispatchMetrics;

/// Unbuffered dispatcher.
///
/// Polls the stop-signal store before every pull, skips `None` items,
/// contains per-item failures, and on exit always sends the terminal frame
/// and completes the handle.
pub struct Dispatcher<T> {
    core: DispatchCore<T>,
}

impl<T> Dispatcher<T>
where
    T: Into<Payload> + Send + 'static,
{
    /// Dispatcher with the identity transform
    pub fn new(
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
        stop_signals: StopSignalStore,
    ) -> Self {
        Self::with_transform(handle, session_id, stop_signals, |item: T| Ok(item.into()))
    }
}

impl<T> Dispatcher<T>
where
    T: Send + 'static,
{
    pub fn with_transform<F>(
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
        stop_signals: StopSignalStore,
        transform: F,
    ) -> Self
    where
        F: FnMut(T) -> Result<Payload, BoxError> + Send + 'static,
    {
        Self {
            core: DispatchCore::new(handle, session_id.into(), stop_signals, Box::new(transform)),
        }
    }

    /// Called once per failed item; the loop continues afterwards
    pub fn on_item_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&DispatchError) + Send + 'static,
    {
        self.core.on_item_error = Some(Box::new(hook));
        self
    }

    /// Called with each item before it is transformed
    pub fn before_process<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.core.before_process = Some(Box::new(hook));
        self
    }

    /// Called with each transformed payload before it is sent
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

    /// Live counters, readable while the dispatcher runs
    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.core.metrics)
    }

    /// Switch to buffered output with a byte threshold
    pub fn buffered(self, threshold: usize) -> BufferedDispatcher<T> {
        BufferedDispatcher::from_core(self.core, threshold)
    }

    /// Drive `producer` to exhaustion, cancellation or channel close.
    pub async fn run<S>(self, producer: S) -> DispatchSummary
    where
        S: Stream<Item = Option<T>>,
    {
        self.core.drive(Output::Direct, producer).await
    }

    /// Run on its own task. Completion is observed through the handle.
    pub fn spawn<S>(self, producer: S) -> JoinHandle<()>
    where
        S: Stream<Item = Option<T>> + Send + 'static,
    {
        tokio::spawn(async move {
            self.run(producer).await;
        })
    }
}

fn configured<T: Send + 'static>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    transform: TransformFn<T>,
    on_item_error: Option<ItemErrorHook>,
) -> Dispatcher<T> {
    let mut dispatcher =
        Dispatcher::with_transform(handle, session_id, manager.stop_signals().clone(), transform)
            .end_timestamp(manager.config().dispatch.end_timestamp);
    dispatcher.core.on_item_error = on_item_error;
    dispatcher
}

/// Dispatch with the identity transform, polling `manager`'s stop signals
pub async fn dispatch<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
) -> DispatchSummary
where
    T: Into<Payload> + Send + 'static,
    S: Stream<Item = Option<T>>,
{
    Dispatcher::new(handle, session_id, manager.stop_signals().clone())
        .end_timestamp(manager.config().dispatch.end_timestamp)
        .run(producer)
        .await
}

/// Dispatch with a transform and an optional item-error hook
pub async fn dispatch_with<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
    transform: TransformFn<T>,
    on_item_error: Option<ItemErrorHook>,
) -> DispatchSummary
where
    T: Send + 'static,
    S: Stream<Item = Option<T>>,
{
    configured(manager, handle, session_id, transform, on_item_error)
        .run(producer)
        .await
}

/// `dispatch` on its own task
pub fn spawn_dispatch<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
) -> JoinHandle<()>
where
    T: Into<Payload> + Send + 'static,
    S: Stream<Item = Option<T>> + Send + 'static,
{
    Dispatcher::new(handle, session_id, manager.stop_signals().clone())
        .end_timestamp(manager.config().dispatch.end_timestamp)
        .spawn(producer)
}

/// `dispatch_with` on its own task
pub fn spawn_dispatch_with<T, S>(
    manager: &SessionManager,
    handle: ChannelHandle,
    session_id: impl Into<SessionId>,
    producer: S,
    transform: TransformFn<T>,
    on_item_error: Option<ItemErrorHook>,
) -> JoinHandle<()>
where
    T: Send + 'static,
    S: Stream<Item = Option<T>> + Send + 'static,
{
    configured(manager, handle, session_id, transform, on_item_error).spawn(producer)
}
