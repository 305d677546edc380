//! Fan-out over several stores.
//!
//! [`MultiStorage`] presents an ordered list of backends as one store:
//!
//! | Operation | Rule |
//! |-----------|------|
//! | `keys` | union, first occurrence order |
//! | `values` / `entries` | merged by key, later backend wins |
//! | `has` | any backend |
//! | `get` | first backend that has the key |
//! | `set` / `update` / `delete` | every backend, concurrently |
//!
//! Note that `get` and `entries` resolve conflicts differently: when two
//! backends disagree on a key, `get` returns the first backend's document
//! while `entries` reports the last one's. Callers that let backends
//! disagree should not rely on either result.

use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use futures::future::try_join_all;
use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, EntryStream, KeyStream, Storage, ValueStream};

/// Composes several stores into one.
#[derive(Clone, Default)]
pub struct MultiStorage {
    backends: Vec<Arc<dyn Storage>>,
}

impl std::fmt::Debug for MultiStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiStorage")
            .field("backends", &self.backends.len())
            .finish()
    }
}

impl MultiStorage {
    /// Compose `backends`, in priority order.
    #[must_use]
    pub fn new(backends: Vec<Arc<dyn Storage>>) -> Self {
        Self { backends }
    }

    /// The composed backends.
    #[must_use]
    pub fn backends(&self) -> &[Arc<dyn Storage>] {
        &self.backends
    }

    /// Number of backends.
    #[must_use]
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Whether no backends are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Merge every backend's entries, later backends overwriting earlier.
    async fn merged(&self, namespace: &str) -> StorageResult<IndexMap<String, Document>> {
        let mut merged = IndexMap::new();
        for backend in &self.backends {
            let mut entries = backend.entries(namespace);
            while let Some((key, value)) = entries.try_next().await? {
                merged.insert(key, value);
            }
        }
        Ok(merged)
    }
}

#[async_trait]
impl Storage for MultiStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            for entry in self.merged(namespace).await? {
                yield entry;
            }
        };
        Box::pin(stream)
    }

    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            let mut seen = IndexSet::new();
            for backend in &self.backends {
                let mut keys = backend.keys(namespace);
                while let Some(key) = keys.try_next().await? {
                    if seen.insert(key.clone()) {
                        yield key;
                    }
                }
            }
        };
        Box::pin(stream)
    }

    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            for value in self.merged(namespace).await?.into_values() {
                yield value;
            }
        };
        Box::pin(stream)
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        for backend in &self.backends {
            if backend.has(namespace, key).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        for backend in &self.backends {
            if let Some(value) = backend.get(namespace, key).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        debug!(namespace, key, backends = self.backends.len(), "Fan-out set");
        try_join_all(
            self.backends
                .iter()
                .map(|backend| backend.set(namespace, key, value.clone())),
        )
        .await?;
        Ok(())
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        debug!(namespace, key, backends = self.backends.len(), "Fan-out update");
        let results = try_join_all(
            self.backends
                .iter()
                .map(|backend| backend.update(namespace, key, patch.clone())),
        )
        .await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::item_does_not_exist(namespace, key))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        debug!(namespace, key, backends = self.backends.len(), "Fan-out delete");
        let results = try_join_all(
            self.backends
                .iter()
                .map(|backend| backend.delete(namespace, key)),
        )
        .await?;
        Ok(results.into_iter().any(|existed| existed))
    }
}
