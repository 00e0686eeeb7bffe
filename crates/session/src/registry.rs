//! SessionRegistry - session id to open channel handle
//!
//! Safe for concurrent use from dispatcher tasks, lifecycle transitions and
//! request handlers without any external locking.

use std::sync::{Arc, Weak};

use contracts::{SessionId, Transport};
use dashmap::DashMap;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::handle::{ChannelHandle, ChannelOptions};

/// Concurrent map of live channels.
///
/// Cheap to clone; clones share the same maps. Handles keep only a weak
/// back-reference, so the registry never owns a handle past `Closed`: the
/// handle removes its own entry when it closes.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
}

#[derive(Default)]
pub(crate) struct RegistryShared {
    sessions: DashMap<SessionId, ChannelHandle>,
    /// Tasks feeding a session, aborted when its channel closes
    upstreams: DashMap<SessionId, AbortHandle>,
}

impl RegistryShared {
    /// Drop `id` if it still maps to `handle`, and abort its upstream.
    ///
    /// A handle superseded by a newer registration leaves the newer one alone.
    pub(crate) fn release(&self, id: &SessionId, handle: &ChannelHandle) -> bool {
        let removed = self
            .sessions
            .remove_if(id, |_, current| current.ptr_eq(handle))
            .is_some();

        if removed {
            debug!(session_id = %id, "Session unregistered");
            if let Some((_, upstream)) = self.upstreams.remove(id) {
                upstream.abort();
                debug!(session_id = %id, "Upstream task aborted");
            }
        }
        removed
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                sessions: DashMap::with_capacity(capacity),
                upstreams: DashMap::new(),
            }),
        }
    }

    /// Open a channel over `transport` and register it under `id`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open_channel<T>(
        &self,
        id: impl Into<SessionId>,
        transport: T,
        options: ChannelOptions,
    ) -> ChannelHandle
    where
        T: Transport + Send + 'static,
    {
        let handle = ChannelHandle::open(id, transport, options);
        self.register(handle.session_id().clone(), handle.clone());
        handle
    }

    /// Insert or overwrite the mapping for `id`.
    ///
    /// Overwriting supersedes the prior channel; the prior handle stays
    /// independently closable by whoever holds it. Returns the prior handle.
    /// The entry is released when `handle` closes, whatever `id` is and
    /// however many registries hold the handle.
    pub fn register(&self, id: SessionId, handle: ChannelHandle) -> Option<ChannelHandle> {
        handle.bind_registry(self.downgrade(), id.clone());

        let prior = self.shared.sessions.insert(id.clone(), handle.clone());
        if let Some(prior) = &prior {
            if !prior.ptr_eq(&handle) {
                debug!(session_id = %id, "Session superseded by a new channel");
            }
        } else {
            debug!(session_id = %id, "Session registered");
        }

        // The handle may have closed between creation and insert.
        if !handle.state().is_open() {
            self.shared.release(&id, &handle);
        }
        prior
    }

    pub fn lookup(&self, id: &str) -> Option<ChannelHandle> {
        self.shared.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove the mapping for `id` and abort its upstream. Idempotent.
    ///
    /// The removed handle itself stays open.
    pub fn unregister(&self, id: &str) -> Option<ChannelHandle> {
        let removed = self.shared.sessions.remove(id).map(|(_, handle)| handle);
        if removed.is_some() {
            debug!(session_id = %id, "Session unregistered");
        }
        if let Some((_, upstream)) = self.shared.upstreams.remove(id) {
            upstream.abort();
            debug!(session_id = %id, "Upstream task aborted");
        }
        removed
    }

    pub fn exists(&self, id: &str) -> bool {
        self.shared.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.shared
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Record the task feeding `id`; it is aborted when the channel closes.
    ///
    /// A previously attached task for the same id is aborted immediately.
    pub fn attach_upstream(&self, id: impl Into<SessionId>, upstream: AbortHandle) {
        let id = id.into();
        if !self.exists(&id) {
            warn!(session_id = %id, "Upstream attached to an unregistered session");
        }
        if let Some(prior) = self.shared.upstreams.insert(id.clone(), upstream) {
            prior.abort();
            debug!(session_id = %id, "Replaced upstream task aborted");
        }
    }

    /// Forget the upstream task for `id` without aborting it
    pub fn detach_upstream(&self, id: &str) -> Option<AbortHandle> {
        self.shared.upstreams.remove(id).map(|(_, upstream)| upstream)
    }

    pub fn has_upstream(&self, id: &str) -> bool {
        self.shared.upstreams.contains_key(id)
    }

    fn downgrade(&self) -> Weak<RegistryShared> {
        Arc::downgrade(&self.shared)
    }
}
