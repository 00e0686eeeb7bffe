//! StreamProcessor - fluent setup for a spawned dispatch
//!
//! ```ignore
//! StreamProcessor::new(&manager, handle, "chat-42")
//!     .before_process(|token: &String| audit(token))
//!     .on_item_error(|err| tracing::warn!(error = %err, "token dropped"))
//!     .with_buffer(256)
//!     .process(tokens);
//! ```

use contracts::{Payload, SessionId};
use futures::Stream;
use session::{ChannelHandle, SessionManager};
use tokio::task::JoinHandle;

use crate::buffered::BufferedDispatcher;
use crate::dispatcher::Dispatcher;
use crate::engine::{AfterHook, BeforeHook, BufferHook, ItemErrorHook, TransformFn};
use crate::error::{BoxError, DispatchError};

pub struct StreamProcessor<T> {
    manager: SessionManager,
    handle: ChannelHandle,
    session_id: SessionId,
    transform: TransformFn<T>,
    on_item_error: Option<ItemErrorHook>,
    before_process: Option<BeforeHook<T>>,
    after_process: Option<AfterHook>,
    buffer_threshold: Option<usize>,
    on_buffer_ready: Option<BufferHook>,
}

impl<T> StreamProcessor<T>
where
    T: Into<Payload> + Send + 'static,
{
    pub fn new(
        manager: &SessionManager,
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
    ) -> Self {
        Self::with_transform(manager, handle, session_id, |item: T| Ok(item.into()))
    }
}

impl<T> StreamProcessor<T>
where
    T: Send + 'static,
{
    pub fn with_transform<F>(
        manager: &SessionManager,
        handle: ChannelHandle,
        session_id: impl Into<SessionId>,
        transform: F,
    ) -> Self
    where
        F: FnMut(T) -> Result<Payload, BoxError> + Send + 'static,
    {
        Self {
            manager: manager.clone(),
            handle,
            session_id: session_id.into(),
            transform: Box::new(transform),
            on_item_error: None,
            before_process: None,
            after_process: None,
            buffer_threshold: None,
            on_buffer_ready: None,
        }
    }

    pub fn on_item_error<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&DispatchError) + Send + 'static,
    {
        self.on_item_error = Some(Box::new(hook));
        self
    }

    pub fn before_process<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.before_process = Some(Box::new(hook));
        self
    }

    pub fn after_process<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Payload) + Send + 'static,
    {
        self.after_process = Some(Box::new(hook));
        self
    }

    /// Buffer output and flush every `threshold` bytes (0 disables buffering)
    pub fn with_buffer(mut self, threshold: usize) -> Self {
        self.buffer_threshold = (threshold > 0).then_some(threshold);
        self
    }

    pub fn on_buffer_ready<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.on_buffer_ready = Some(Box::new(hook));
        self
    }

    /// Spawn the configured dispatcher over `producer`.
    pub fn process<S>(self, producer: S) -> JoinHandle<()>
    where
        S: Stream<Item = Option<T>> + Send + 'static,
    {
        let end_timestamp = self.manager.config().dispatch.end_timestamp;
        let mut dispatcher = Dispatcher::with_transform(
            self.handle,
            self.session_id,
            self.manager.stop_signals().clone(),
            self.transform,
        )
        .end_timestamp(end_timestamp);

        if let Some(hook) = self.on_item_error {
            dispatcher = dispatcher.on_item_error(hook);
        }
        if let Some(hook) = self.before_process {
            dispatcher = dispatcher.before_process(hook);
        }
        if let Some(hook) = self.after_process {
            dispatcher = dispatcher.after_process(hook);
        }

        match self.buffer_threshold {
            Some(threshold) => {
                let mut buffered: BufferedDispatcher<T> = dispatcher.buffered(threshold);
                if let Some(hook) = self.on_buffer_ready {
                    buffered = buffered.on_buffer_ready(hook);
                }
                buffered.spawn(producer)
            }
            None => dispatcher.spawn(producer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use session::RecordingTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unbuffered_process() {
        let manager = SessionManager::default();
        let (transport, frames) = RecordingTransport::new("mem");
        let handle = manager.open_channel("s1", transport);
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let (b, a) = (Arc::clone(&before), Arc::clone(&after));

        StreamProcessor::new(&manager, handle.clone(), "s1")
            .before_process(move |_: &&str| {
                b.fetch_add(1, Ordering::SeqCst);
            })
            .after_process(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .process(stream::iter(vec![Some("x"), Some("y")]));

        tokio::time::timeout(Duration::from_secs(1), handle.closed())
            .await
            .unwrap();

        assert_eq!(frames.events(), vec!["data", "data", "end"]);
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_buffered_process() {
        let manager = SessionManager::default();
        let (transport, frames) = RecordingTransport::new("mem");
        let handle = manager.open_channel("s1", transport);
        let flushes = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&flushes);

        let task = StreamProcessor::with_transform(&manager, handle.clone(), "s1", |n: u8| {
            Ok(Payload::from(n.to_string()))
        })
        .with_buffer(4)
        .on_buffer_ready(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .process(stream::iter((0..10).map(Some)));

        task.await.unwrap();

        assert_eq!(frames.data(), vec!["0123", "4567", "89"]);
        assert_eq!(flushes.load(Ordering::SeqCst), 3);
        assert!(!manager.exists("s1"));
    }

    #[tokio::test]
    async fn test_zero_buffer_means_unbuffered() {
        let manager = SessionManager::default();
        let (transport, frames) = RecordingTransport::new("mem");
        let handle = manager.open_channel("s1", transport);

        StreamProcessor::new(&manager, handle, "s1")
            .with_buffer(0)
            .process(stream::iter(vec![Some("a"), Some("b")]))
            .await
            .unwrap();

        assert_eq!(frames.data(), vec!["a", "b"]);
    }
}
