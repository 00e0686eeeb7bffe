//! SessionManager - the caller-facing session API
//!
//! Bundles one registry, one stop-signal store and the configuration. Build
//! one at startup and share clones with every handler and dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use contracts::{DataFrame, Payload, SendError, SessionId, StreamerConfig, Transport};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::SessionError;
use crate::handle::{ChannelHandle, ChannelOptions};
use crate::registry::SessionRegistry;
use crate::stop_signal::StopSignalStore;

/// Timeout of the channel opened by [`SessionManager::send_once`]
pub const SEND_ONCE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SessionManager {
    registry: SessionRegistry,
    stop_signals: StopSignalStore,
    config: Arc<StreamerConfig>,
    detached_seq: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(config: StreamerConfig) -> Self {
        contracts::init_end_timestamp();
        let registry = SessionRegistry::with_capacity(config.session.registry_capacity);
        let stop_signals = StopSignalStore::new(config.session.stop_signal_ttl());
        Self::with_parts(registry, stop_signals, config)
    }

    /// Assemble from an existing registry and store
    pub fn with_parts(
        registry: SessionRegistry,
        stop_signals: StopSignalStore,
        config: StreamerConfig,
    ) -> Self {
        Self {
            registry,
            stop_signals,
            config: Arc::new(config),
            detached_seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn stop_signals(&self) -> &StopSignalStore {
        &self.stop_signals
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    fn options(&self, timeout: Option<Duration>) -> ChannelOptions {
        ChannelOptions {
            timeout,
            queue_capacity: self.config.session.queue_capacity,
        }
    }

    // ========================================================================
    // Channels
    // ========================================================================

    /// Open and register a channel with the configured default timeout
    pub fn open_channel<T>(&self, id: impl Into<SessionId>, transport: T) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        let options = self.options(self.config.session.default_timeout());
        self.registry.open_channel(id, transport, options)
    }

    /// Open and register a channel with an explicit timeout
    pub fn open_channel_with_timeout<T>(
        &self,
        id: impl Into<SessionId>,
        transport: T,
        timeout: Duration,
    ) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        self.registry
            .open_channel(id, transport, self.options(Some(timeout)))
    }

    /// Open a channel that is not registered under any id.
    ///
    /// Its lifecycle is only logged; there is no registry entry to clean up.
    pub fn open_detached<T>(&self, transport: T, timeout: Option<Duration>) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        let seq = self.detached_seq.fetch_add(1, Ordering::Relaxed);
        ChannelHandle::open(format!("detached-{seq}"), transport, self.options(timeout))
    }

    /// `open_detached` with the configured default timeout
    pub fn open_detached_default<T>(&self, transport: T) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        self.open_detached(transport, self.config.session.default_timeout())
    }

    pub fn get(&self, id: &str) -> Option<ChannelHandle> {
        self.registry.lookup(id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.registry.exists(id)
    }

    /// Complete the channel registered under `id`. Returns `false` for unknown
    /// or already closing ids.
    pub fn close(&self, id: &str) -> bool {
        match self.registry.lookup(id) {
            Some(handle) => handle.complete(),
            None => false,
        }
    }

    /// Complete the channel registered under `id` with an error cause
    pub fn error(&self, id: &str, cause: impl Into<String>) -> bool {
        match self.registry.lookup(id) {
            Some(handle) => handle.complete_with_error(cause),
            None => false,
        }
    }

    /// Ask the dispatcher for `id` to stop at its next polling point
    pub fn request_stop(&self, id: impl Into<SessionId>) {
        let id = id.into();
        info!(session_id = %id, "Stop requested");
        self.stop_signals.request_stop(id);
    }

    /// Abort `upstream` when the channel for `id` closes
    pub fn attach_upstream(&self, id: impl Into<SessionId>, upstream: AbortHandle) {
        self.registry.attach_upstream(id, upstream);
    }

    /// Terminal frame stamped according to `dispatch.end_timestamp`
    pub fn end_frame(&self) -> DataFrame {
        self.config.dispatch.end_timestamp.end_frame()
    }

    // ========================================================================
    // Sends by session id
    // ========================================================================

    /// Send a `data` frame to the channel registered under `id`.
    ///
    /// Unknown ids are a no-op. A failed write has already closed the session
    /// by the time the error is returned.
    pub async fn send_message(
        &self,
        id: &str,
        payload: impl Into<Payload>,
    ) -> Result<(), SendError> {
        match self.registry.lookup(id) {
            Some(handle) => handle.send(DataFrame::data(payload)).await,
            None => {
                debug!(session_id = %id, "Send to unknown session ignored");
                Ok(())
            }
        }
    }

    /// Send an `error` frame carrying `error_response`, then close with an error.
    #[instrument(name = "send_and_complete_with_error", skip(self, error_response))]
    pub async fn send_and_complete_with_error(&self, id: &str, error_response: serde_json::Value) {
        let Some(handle) = self.registry.lookup(id) else {
            warn!(session_id = %id, "Session does not exist, cannot send error message");
            return;
        };

        let cause = error_response.to_string();
        if let Err(e) = handle.send(DataFrame::new("error", error_response)).await {
            warn!(session_id = %id, error = %e, "Send error message failed");
        }
        handle.complete_with_error(cause);
    }

    /// Push `content` one character per frame, each base64 encoded.
    ///
    /// Pauses `letter_delay_ms` after an ASCII letter and `interval` (default
    /// `typewriter.default_interval_ms`) after anything else. Stops early once
    /// the session is gone or a write fails.
    #[instrument(name = "send_typewriter", skip(self, content), fields(chars = content.chars().count()))]
    pub async fn send_typewriter(
        &self,
        id: &str,
        content: &str,
        interval: Option<Duration>,
    ) -> Result<(), SessionError> {
        let handle = self
            .registry
            .lookup(id)
            .ok_or_else(|| SessionError::UnknownSession(SessionId::new(id)))?;

        let letter_delay = Duration::from_millis(self.config.typewriter.letter_delay_ms);
        let interval = interval
            .unwrap_or_else(|| Duration::from_millis(self.config.typewriter.default_interval_ms));

        let mut utf8 = [0u8; 4];
        for ch in content.chars() {
            if !handle.is_open() {
                debug!(session_id = %id, "Typewriter stopped, channel closed");
                break;
            }

            let encoded = BASE64.encode(ch.encode_utf8(&mut utf8).as_bytes());
            if let Err(e) = handle.send(DataFrame::data(encoded)).await {
                error!(session_id = %id, error = %e, "Typewriter send failed");
                return Err(e.into());
            }

            let pause = if ch.is_ascii_alphabetic() {
                letter_delay
            } else {
                interval
            };
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Sends on a handle
    // ========================================================================

    /// Write one prebuilt frame
    pub async fn send_one(&self, handle: &ChannelHandle, frame: DataFrame) -> Result<(), SendError> {
        handle.send(frame).await
    }

    /// Write a `data` frame; text goes out verbatim, JSON is serialized
    pub async fn send_data(
        &self,
        handle: &ChannelHandle,
        payload: impl Into<Payload>,
    ) -> Result<(), SendError> {
        let payload = payload.into();
        if payload.is_empty() {
            warn!(session_id = %handle.session_id(), "Attempted to send empty data");
            return Ok(());
        }
        handle.send(DataFrame::data(payload)).await
    }

    /// Write an `error` frame (`"Unknown error"` when `message` is absent)
    pub async fn send_error(
        &self,
        handle: &ChannelHandle,
        message: Option<&str>,
    ) -> Result<(), SendError> {
        handle.send(DataFrame::error(message)).await
    }

    /// Write a `complete` frame wrapping optional caller data
    pub async fn send_complete(
        &self,
        handle: &ChannelHandle,
        data: Option<serde_json::Value>,
    ) -> Result<(), SendError> {
        handle.send(DataFrame::complete(data)).await
    }

    /// Best-effort terminal frame, then complete. Never fails.
    pub async fn send_end_and_complete(&self, handle: &ChannelHandle) {
        match handle.send(self.end_frame()).await {
            Ok(()) => {}
            Err(e) if e.is_client_disconnect() => {
                warn!(session_id = %handle.session_id(), error = %e, "Client gone before end signal");
            }
            Err(e) => {
                error!(session_id = %handle.session_id(), error = %e, "Failed to send end signal");
            }
        }
        handle.complete();
    }

    /// Best-effort `error` frame, then complete
    pub async fn complete_with_error_message(&self, handle: &ChannelHandle, message: &str) {
        if let Err(e) = handle.send(DataFrame::error(Some(message))).await {
            error!(session_id = %handle.session_id(), error = %e, "Failed to send error message");
        }
        handle.complete();
    }

    /// Open a detached channel, send one `data` frame, complete it.
    pub async fn send_once<T>(&self, transport: T, payload: impl Into<Payload>) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        let handle = self.open_detached(transport, Some(SEND_ONCE_TIMEOUT));
        if let Err(e) = handle.send(DataFrame::data(payload)).await {
            info!(session_id = %handle.session_id(), error = %e, "Single-shot send failed");
        }
        handle.complete();
        handle
    }

    /// Produce one value, run `before`, send it, run `after`.
    ///
    /// A supplier or send failure is logged and handed to `on_error`; `after`
    /// then does not run.
    pub async fn send_with_callback<S, B, A, E>(
        &self,
        handle: &ChannelHandle,
        supplier: S,
        before: B,
        after: A,
        on_error: E,
    ) where
        S: FnOnce() -> Result<Payload, SessionError>,
        B: FnOnce(&Payload),
        A: FnOnce(&Payload),
        E: FnOnce(SessionError),
    {
        let result = async {
            let payload = supplier()?;
            before(&payload);
            handle.send(DataFrame::data(payload.clone())).await?;
            after(&payload);
            Ok::<(), SessionError>(())
        }
        .await;

        if let Err(e) = result {
            error!(session_id = %handle.session_id(), error = %e, "Callback send failed");
            on_error(e);
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(StreamerConfig::default())
    }
}
