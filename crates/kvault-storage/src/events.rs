//! Storage wrapper that announces mutations.
//!
//! Every `set`, `update` and `delete` made through an [`EventStorage`] emits a
//! `pre-*` event before touching the wrapped store and a `post-*` event after
//! it succeeds.
//!
//! Two kinds of observers exist:
//!
//! - **Listeners** ([`StorageListener`]) run synchronously for every event and
//!   may veto a `pre-*` event, which fails the operation with
//!   [`StorageError::OperationPrevented`].
//! - **Subscribers** ([`EventStorage::subscribe`]) receive `post-*` events
//!   over a broadcast channel and cannot influence the operation.
//!
//! Reads pass straight through.

use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, EntryStream, KeyStream, Storage, ValueStream};

/// Default capacity of the subscriber channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Kind of [`StorageEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageEventType {
    /// Before a document is written.
    PreSet,
    /// After a document was written.
    PostSet,
    /// Before a document is patched.
    PreUpdate,
    /// After a document was patched.
    PostUpdate,
    /// Before a document is deleted.
    PreDelete,
    /// After a delete completed.
    PostDelete,
}

impl StorageEventType {
    /// Wire name, e.g. `pre-set`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreSet => "pre-set",
            Self::PostSet => "post-set",
            Self::PreUpdate => "pre-update",
            Self::PostUpdate => "post-update",
            Self::PreDelete => "pre-delete",
            Self::PostDelete => "post-delete",
        }
    }

    /// Whether listeners may veto events of this kind.
    #[must_use]
    pub fn is_cancelable(self) -> bool {
        matches!(self, Self::PreSet | Self::PreUpdate | Self::PreDelete)
    }
}

impl fmt::Display for StorageEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation observed by an [`EventStorage`].
#[derive(Debug, Clone, PartialEq)]
pub enum StorageEvent {
    /// A document is about to be written.
    PreSet {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
        /// Document to be written.
        value: Document,
    },
    /// A document was written.
    PostSet {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
        /// Document written.
        value: Document,
    },
    /// A document is about to be patched.
    PreUpdate {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
        /// Fields to merge.
        patch: Document,
    },
    /// A document was patched.
    PostUpdate {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
        /// Fields that were merged.
        patch: Document,
        /// The stored document after merging.
        result: Document,
    },
    /// A document is about to be deleted.
    PreDelete {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
    },
    /// A delete completed.
    PostDelete {
        /// Target namespace.
        namespace: String,
        /// Target key.
        key: String,
        /// Whether the document existed.
        existed: bool,
    },
}

impl StorageEvent {
    /// The event kind.
    #[must_use]
    pub fn event_type(&self) -> StorageEventType {
        match self {
            Self::PreSet { .. } => StorageEventType::PreSet,
            Self::PostSet { .. } => StorageEventType::PostSet,
            Self::PreUpdate { .. } => StorageEventType::PreUpdate,
            Self::PostUpdate { .. } => StorageEventType::PostUpdate,
            Self::PreDelete { .. } => StorageEventType::PreDelete,
            Self::PostDelete { .. } => StorageEventType::PostDelete,
        }
    }

    /// Namespace the event concerns.
    #[must_use]
    pub fn namespace(&self) -> &str {
        match self {
            Self::PreSet { namespace, .. }
            | Self::PostSet { namespace, .. }
            | Self::PreUpdate { namespace, .. }
            | Self::PostUpdate { namespace, .. }
            | Self::PreDelete { namespace, .. }
            | Self::PostDelete { namespace, .. } => namespace,
        }
    }

    /// Key the event concerns.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::PreSet { key, .. }
            | Self::PostSet { key, .. }
            | Self::PreUpdate { key, .. }
            | Self::PostUpdate { key, .. }
            | Self::PreDelete { key, .. }
            | Self::PostDelete { key, .. } => key,
        }
    }
}

/// What a listener wants done with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerVerdict {
    /// Let the operation proceed.
    #[default]
    Continue,
    /// Veto the operation. Ignored for `post-*` events.
    Prevent,
}

/// Synchronous observer of storage events.
///
/// Listeners run inline with the operation and should return quickly.
pub trait StorageListener: Send + Sync {
    /// Called for every accepted event.
    fn on_event(&self, event: &StorageEvent) -> ListenerVerdict;

    /// Whether to receive events of this kind. Defaults to all.
    fn accepts(&self, event_type: StorageEventType) -> bool {
        let _ = event_type;
        true
    }

    /// Name used in logs.
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> StorageListener for F
where
    F: Fn(&StorageEvent) -> ListenerVerdict + Send + Sync,
{
    fn on_event(&self, event: &StorageEvent) -> ListenerVerdict {
        self(event)
    }
}

/// Handle returned by [`EventStorage::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Receiver for `post-*` events.
pub struct StorageEventReceiver {
    receiver: broadcast::Receiver<Arc<StorageEvent>>,
}

impl StorageEventReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once the [`EventStorage`] is dropped. Events missed
    /// because this receiver fell behind are skipped with a warning.
    pub async fn recv(&mut self) -> Option<Arc<StorageEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Storage event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next event if one is ready.
    pub fn try_recv(&mut self) -> Option<Arc<StorageEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Storage event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}

/// Wraps a store and emits events around every mutation.
pub struct EventStorage {
    inner: Arc<dyn Storage>,
    listeners: RwLock<IndexMap<ListenerId, Arc<dyn StorageListener>>>,
    sender: broadcast::Sender<Arc<StorageEvent>>,
}

impl fmt::Debug for EventStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.read().map(|l| l.len()).unwrap_or_default();
        f.debug_struct("EventStorage")
            .field("listeners", &listeners)
            .field("subscribers", &self.sender.receiver_count())
            .finish_non_exhaustive()
    }
}

impl EventStorage {
    /// Wrap `inner` with the default channel capacity.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self::with_capacity(inner, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Wrap `inner`, buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(inner: Arc<dyn Storage>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner,
            listeners: RwLock::new(IndexMap::new()),
            sender,
        }
    }

    /// Register a listener. Listeners run in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the listener lock is poisoned.
    pub fn add_listener(&self, listener: Arc<dyn StorageListener>) -> StorageResult<ListenerId> {
        let id = ListenerId::new();
        let name = listener.name().to_owned();
        self.listeners
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(id, listener);
        debug!(listener = %name, "Storage listener registered");
        Ok(id)
    }

    /// Remove a listener. Returns `true` if it was registered.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the listener lock is poisoned.
    pub fn remove_listener(&self, id: ListenerId) -> StorageResult<bool> {
        let removed = self
            .listeners
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .shift_remove(&id)
            .is_some();
        Ok(removed)
    }

    /// Receive `post-*` events from now on.
    #[must_use]
    pub fn subscribe(&self) -> StorageEventReceiver {
        StorageEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Run listeners for `event`. Returns `true` if a listener vetoed it.
    fn notify(&self, event: &StorageEvent) -> StorageResult<bool> {
        let event_type = event.event_type();
        let listeners: Vec<Arc<dyn StorageListener>> = self
            .listeners
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .values()
            .filter(|listener| listener.accepts(event_type))
            .cloned()
            .collect();

        trace!(%event_type, listeners = listeners.len(), "Dispatching storage event");

        let mut prevented = false;
        for listener in listeners {
            let verdict = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event)
            }));
            match verdict {
                Ok(ListenerVerdict::Prevent) if event_type.is_cancelable() => {
                    debug!(listener = %listener.name(), %event_type, "Listener prevented operation");
                    prevented = true;
                },
                Ok(_) => {},
                Err(e) => {
                    warn!(listener = %listener.name(), error = ?e, "Storage listener panicked");
                },
            }
        }
        Ok(prevented)
    }

    /// Run listeners for a `pre-*` event, failing if any vetoes it.
    fn before(&self, event: &StorageEvent) -> StorageResult<()> {
        if self.notify(event)? {
            return Err(StorageError::OperationPrevented(format!(
                "{} on {}/{}",
                event.event_type(),
                event.namespace(),
                event.key()
            )));
        }
        Ok(())
    }

    /// Run listeners for a `post-*` event and broadcast it.
    fn after(&self, event: StorageEvent) -> StorageResult<()> {
        self.notify(&event)?;
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
        Ok(())
    }
}

#[async_trait]
impl Storage for EventStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        self.inner.entries(namespace)
    }

    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        self.inner.keys(namespace)
    }

    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        self.inner.values(namespace)
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        self.inner.has(namespace, key).await
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        self.before(&StorageEvent::PreSet {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            value: value.clone(),
        })?;
        self.inner.set(namespace, key, value.clone()).await?;
        self.after(StorageEvent::PostSet {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            value,
        })
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        self.before(&StorageEvent::PreUpdate {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            patch: patch.clone(),
        })?;
        let result = self.inner.update(namespace, key, patch.clone()).await?;
        self.after(StorageEvent::PostUpdate {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            patch,
            result: result.clone(),
        })?;
        Ok(result)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        self.before(&StorageEvent::PreDelete {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
        })?;
        let existed = self.inner.delete(namespace, key).await?;
        self.after(StorageEvent::PostDelete {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
            existed,
        })?;
        Ok(existed)
    }
}
