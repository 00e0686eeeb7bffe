//! The dispatch loop shared by the unbuffered and buffered dispatchers

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::{pin, Pin};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DataFrame, EndTimestampMode, Payload, SessionId};
use futures::{FutureExt, Stream, StreamExt};
use observability::DispatchRecord;
use session::{ChannelHandle, StopSignalStore};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{BoxError, DispatchError};
use crate::metrics::DispatchMetrics;

pub type TransformFn<T> = Box<dyn FnMut(T) -> Result<Payload, BoxError> + Send>;
pub type ItemErrorHook = Box<dyn FnMut(&DispatchError) + Send>;
pub type BeforeHook<T> = Box<dyn FnMut(&T) + Send>;
pub type AfterHook = Box<dyn FnMut(&Payload) + Send>;
pub type BufferHook = Box<dyn FnMut(&str) + Send>;

/// Why a dispatch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// The producer ran dry
    Exhausted,
    /// A stop request was consumed
    Stopped,
    /// The channel closed underneath the loop (timeout, disconnect, close)
    ChannelClosed,
    /// The producer or a hook panicked
    Panicked,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::Stopped => "stopped",
            Self::ChannelClosed => "channel_closed",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one dispatch run
#[derive(Debug, Clone)]
pub struct DispatchSummary {
    pub session_id: SessionId,
    pub termination: Termination,
    pub items_pulled: u64,
    /// Non-terminal frames the transport accepted
    pub frames_sent: u64,
    pub item_errors: u64,
    pub skipped: u64,
    pub flushes: u64,
    pub elapsed: Duration,
}

impl From<&DispatchSummary> for DispatchRecord {
    fn from(summary: &DispatchSummary) -> Self {
        DispatchRecord {
            session_id: summary.session_id.to_string(),
            termination: summary.termination.as_str(),
            frames_sent: summary.frames_sent,
            item_errors: summary.item_errors,
            elapsed: summary.elapsed,
        }
    }
}

/// Byte-threshold text accumulator
pub(crate) struct FrameBuffer {
    threshold: usize,
    content: String,
    on_ready: Option<BufferHook>,
}

impl FrameBuffer {
    pub(crate) fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            content: String::new(),
            on_ready: None,
        }
    }

    pub(crate) fn set_on_ready(&mut self, hook: BufferHook) {
        self.on_ready = Some(hook);
    }

    pub(crate) fn threshold(&self) -> usize {
        self.threshold
    }

    fn push(&mut self, payload: Payload) {
        self.content.push_str(&payload.into_text());
    }

    fn is_full(&self) -> bool {
        self.content.len() >= self.threshold
    }

    /// Hand the content to the ready hook and clear the buffer
    fn take(&mut self) -> Option<String> {
        if self.content.is_empty() {
            return None;
        }
        let content = std::mem::take(&mut self.content);
        if let Some(hook) = self.on_ready.as_mut() {
            hook(&content);
        }
        Some(content)
    }
}

/// Where transformed items go
pub(crate) enum Output {
    /// One frame per item
    Direct,
    /// Accumulate and flush at the threshold
    Buffered(FrameBuffer),
}

/// State of one dispatch run
pub(crate) struct DispatchCore<T> {
    pub(crate) handle: ChannelHandle,
    pub(crate) session_id: SessionId,
    pub(crate) stop_signals: StopSignalStore,
    pub(crate) transform: TransformFn<T>,
    pub(crate) on_item_error: Option<ItemErrorHook>,
    pub(crate) before_process: Option<BeforeHook<T>>,
    pub(crate) after_process: Option<AfterHook>,
    pub(crate) end_timestamp: EndTimestampMode,
    pub(crate) metrics: Arc<DispatchMetrics>,
}

impl<T> DispatchCore<T> {
    pub(crate) fn new(
        handle: ChannelHandle,
        session_id: SessionId,
        stop_signals: StopSignalStore,
        transform: TransformFn<T>,
    ) -> Self {
        Self {
            handle,
            session_id,
            stop_signals,
            transform,
            on_item_error: None,
            before_process: None,
            after_process: None,
            end_timestamp: EndTimestampMode::default(),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    /// Run the loop, then always flush, send the terminal frame and complete.
    #[instrument(
        name = "dispatch_run",
        skip(self, output, producer),
        fields(session_id = %self.session_id)
    )]
    pub(crate) async fn drive<S>(mut self, mut output: Output, producer: S) -> DispatchSummary
    where
        S: Stream<Item = Option<T>>,
    {
        let started = Instant::now();
        let frames_before = self.handle.frames_sent();
        let mut producer = pin!(producer);

        debug!(
            buffered = matches!(output, Output::Buffered(_)),
            "Dispatch started"
        );

        let mut termination = match AssertUnwindSafe(self.pump(&mut output, producer.as_mut()))
            .catch_unwind()
            .await
        {
            Ok(termination) => termination,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Dispatch loop panicked");
                let err = DispatchError::Panicked {
                    session_id: self.session_id.clone(),
                    message,
                };
                self.metrics.inc_item_errors();
                if let Some(hook) = self.on_item_error.as_mut() {
                    if std::panic::catch_unwind(AssertUnwindSafe(|| hook(&err))).is_err() {
                        error!("Item error hook panicked");
                    }
                }
                Termination::Panicked
            }
        };

        if let Output::Buffered(buffer) = &mut output {
            // hooks run again here; a panic must not skip the terminal frame
            if let Err(panic) = AssertUnwindSafe(self.final_flush(buffer))
                .catch_unwind()
                .await
            {
                error!(panic = %panic_message(panic.as_ref()), "Final flush panicked");
                self.metrics.inc_item_errors();
                termination = Termination::Panicked;
            }
        }
        let frames_sent = self.handle.frames_sent().saturating_sub(frames_before);

        match self.handle.send(self.end_frame()).await {
            Ok(()) => trace!("Terminal frame sent"),
            Err(e) if e.is_client_disconnect() => {
                debug!(error = %e, "Client gone before terminal frame");
            }
            Err(e) => warn!(error = %e, "Terminal frame not delivered"),
        }
        self.handle.complete();

        let metrics = self.metrics.snapshot();
        let summary = DispatchSummary {
            session_id: self.session_id.clone(),
            termination,
            items_pulled: metrics.items_pulled,
            frames_sent,
            item_errors: metrics.item_errors,
            skipped: metrics.skipped,
            flushes: metrics.flushes,
            elapsed: started.elapsed(),
        };

        observability::record_dispatch_finished(termination.as_str(), summary.elapsed);
        info!(
            termination = %termination,
            items = summary.items_pulled,
            frames = summary.frames_sent,
            item_errors = summary.item_errors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Dispatch finished"
        );
        summary
    }

    async fn pump<S>(&mut self, output: &mut Output, mut producer: Pin<&mut S>) -> Termination
    where
        S: Stream<Item = Option<T>>,
    {
        loop {
            if self.stop_signals.consume_if_stopped(&self.session_id) {
                info!(session_id = %self.session_id, "Stream stopped by signal");
                return Termination::Stopped;
            }
            if !self.handle.is_open() {
                debug!(session_id = %self.session_id, "Channel closed under dispatch");
                return Termination::ChannelClosed;
            }

            let Some(item) = producer.next().await else {
                // an upstream aborted by the closing channel also ends the stream
                return if self.handle.is_open() {
                    Termination::Exhausted
                } else {
                    Termination::ChannelClosed
                };
            };
            self.metrics.inc_items_pulled();

            let Some(item) = item else {
                self.metrics.inc_skipped();
                continue;
            };

            if let Some(before) = self.before_process.as_mut() {
                before(&item);
            }
            let payload = match (self.transform)(item) {
                Ok(payload) => payload,
                Err(source) => {
                    let err = DispatchError::transform(&self.session_id, source);
                    self.item_failed(err);
                    continue;
                }
            };
            if let Some(after) = self.after_process.as_mut() {
                after(&payload);
            }

            if let Err(e) = self.emit(output, payload).await {
                self.item_failed(e);
            }
        }
    }

    async fn emit(&mut self, output: &mut Output, payload: Payload) -> Result<(), DispatchError> {
        match output {
            Output::Direct => {
                self.handle.send(DataFrame::data(payload)).await?;
                Ok(())
            }
            Output::Buffered(buffer) => {
                buffer.push(payload);
                if buffer.is_full() {
                    self.flush(buffer).await?;
                }
                Ok(())
            }
        }
    }

    async fn flush(&mut self, buffer: &mut FrameBuffer) -> Result<(), DispatchError> {
        let Some(content) = buffer.take() else {
            return Ok(());
        };
        let bytes = content.len();

        self.handle
            .send(DataFrame::data(content))
            .await
            .map_err(|source| DispatchError::Flush {
                session_id: self.session_id.clone(),
                source,
            })?;

        self.metrics.record_flush(bytes);
        observability::record_buffer_flush(bytes);
        trace!(session_id = %self.session_id, bytes, "Buffer flushed");
        Ok(())
    }

    async fn final_flush(&mut self, buffer: &mut FrameBuffer) {
        if let Err(e) = self.flush(buffer).await {
            self.item_failed(e);
        }
    }

    fn item_failed(&mut self, err: DispatchError) {
        self.metrics.inc_item_errors();
        observability::record_item_error();
        error!(session_id = %self.session_id, error = %err, "Stream item failed");
        if let Some(hook) = self.on_item_error.as_mut() {
            hook(&err);
        }
    }

    fn end_frame(&self) -> DataFrame {
        self.end_timestamp.end_frame()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
