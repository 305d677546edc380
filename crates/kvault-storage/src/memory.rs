//! In-memory storage backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_stream::try_stream;
use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, Entry, EntryStream, Storage};

type Namespace = BTreeMap<String, Document>;

/// Storage held entirely in process memory.
///
/// Listings iterate in key order over a snapshot taken when the stream is
/// first polled, so writes made while a listing is being consumed are not
/// observed by it.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Namespace>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every document in `namespace`, or in all namespaces if `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] if the namespace is not a slug.
    pub fn clear(&self, namespace: Option<&str>) -> StorageResult<()> {
        if let Some(namespace) = namespace {
            slug::validate_namespace(namespace)?;
        }
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        match namespace {
            Some(namespace) => {
                data.remove(namespace);
            }
            None => data.clear(),
        }
        Ok(())
    }

    fn snapshot(&self, namespace: &str) -> StorageResult<Vec<Entry>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(data
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            for entry in self.snapshot(namespace)? {
                yield entry;
            }
        };
        Box::pin(stream)
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(data.get(namespace).is_some_and(|ns| ns.contains_key(key)))
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        data.entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let Some(ns) = data.get_mut(namespace) else {
            return Ok(false);
        };
        let existed = ns.remove(key).is_some();
        if ns.is_empty() {
            data.remove(namespace);
        }
        Ok(existed)
    }
}
