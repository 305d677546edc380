//! Mock stores for testing adapters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use kvault_storage::{
    Document, EntryStream, KeyStream, Storage, StorageError, StorageResult, ValueStream, slug,
};

/// Number of calls made to each operation of a [`CountingStorage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `entries` calls.
    pub entries: usize,
    /// `keys` calls.
    pub keys: usize,
    /// `values` calls.
    pub values: usize,
    /// `has` calls.
    pub has: usize,
    /// `get` calls.
    pub get: usize,
    /// `set` calls.
    pub set: usize,
    /// `update` calls.
    pub update: usize,
    /// `delete` calls.
    pub delete: usize,
}

impl CallCounts {
    /// Sum of read calls.
    #[must_use]
    pub fn reads(&self) -> usize {
        [self.entries, self.keys, self.values, self.has, self.get]
            .into_iter()
            .fold(0, usize::saturating_add)
    }

    /// Sum of write calls.
    #[must_use]
    pub fn writes(&self) -> usize {
        [self.set, self.update, self.delete]
            .into_iter()
            .fold(0, usize::saturating_add)
    }
}

/// Wraps a store and counts calls per operation.
///
/// Clones share counters, so a clone can be handed to the adapter under
/// test while the original is kept for assertions.
#[derive(Clone)]
pub struct CountingStorage {
    inner: Arc<dyn Storage>,
    counts: Arc<Mutex<CallCounts>>,
}

impl std::fmt::Debug for CountingStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingStorage")
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

impl CountingStorage {
    /// Count calls made to `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            counts: Arc::new(Mutex::new(CallCounts::default())),
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn counts(&self) -> CallCounts {
        self.counts.lock().map(|c| *c).unwrap_or_default()
    }

    /// Zero every counter.
    pub fn reset(&self) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts = CallCounts::default();
        }
    }

    fn bump(&self, field: fn(&mut CallCounts) -> &mut usize) {
        if let Ok(mut counts) = self.counts.lock() {
            let slot = field(&mut *counts);
            *slot = slot.saturating_add(1);
        }
    }
}

#[async_trait]
impl Storage for CountingStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        self.bump(|c| &mut c.entries);
        self.inner.entries(namespace)
    }

    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        self.bump(|c| &mut c.keys);
        self.inner.keys(namespace)
    }

    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        self.bump(|c| &mut c.values);
        self.inner.values(namespace)
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.bump(|c| &mut c.has);
        self.inner.has(namespace, key).await
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        self.bump(|c| &mut c.get);
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        self.bump(|c| &mut c.set);
        self.inner.set(namespace, key, value).await
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        self.bump(|c| &mut c.update);
        self.inner.update(namespace, key, patch).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.bump(|c| &mut c.delete);
        self.inner.delete(namespace, key).await
    }
}

/// Store whose every operation fails after slug validation.
#[derive(Debug, Clone)]
pub struct FailingStorage {
    message: String,
}

impl FailingStorage {
    /// Fail with `StorageError::Internal(message)`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Internal(self.message.clone())
    }
}

#[async_trait]
impl Storage for FailingStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let error = match slug::validate_namespace(namespace) {
            Ok(()) => self.error(),
            Err(e) => e,
        };
        futures::stream::once(async move { Err(error) }).boxed()
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        Err(self.error())
    }

    async fn set(&self, namespace: &str, key: &str, _value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        Err(self.error())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        Err(self.error())
    }
}

/// Wraps a store whose writes can be switched to fail.
///
/// Reads always pass through. While [`fail_writes`](Self::fail_writes) is
/// on, `set`, `update` and `delete` return `StorageError::Internal` without
/// reaching the wrapped store. Clones share the switch.
#[derive(Clone)]
pub struct FlakyStorage {
    inner: Arc<dyn Storage>,
    failing: Arc<AtomicBool>,
}

impl std::fmt::Debug for FlakyStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyStorage")
            .field("failing", &self.failing.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl FlakyStorage {
    /// Wrap `inner` with writes initially succeeding.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make writes fail (`true`) or pass through (`false`).
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, namespace: &str, key: &str) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Internal(format!(
                "write to {namespace}/{key} rejected"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FlakyStorage {
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
        self.inner.has(namespace, key).await
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        self.check(namespace, key)?;
        self.inner.set(namespace, key, value).await
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        self.check(namespace, key)?;
        self.inner.update(namespace, key, patch).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check(namespace, key)?;
        self.inner.delete(namespace, key).await
    }
}
