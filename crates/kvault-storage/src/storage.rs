//! The storage contract.
//!
//! A backend implements three primitives: [`Storage::entries`],
//! [`Storage::set`] and [`Storage::delete`]. Everything else has a default
//! built on those three, so a minimal backend gets the full query surface
//! for free. Backends override defaults only to go faster; an override must
//! behave exactly like the default it replaces.
//!
//! Operations that take closures (`find`, `filter`, `map`) live on
//! [`StorageExt`], which is implemented for every [`Storage`] and keeps the
//! core trait usable as `dyn Storage`.

use async_trait::async_trait;
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};

use crate::error::{StorageError, StorageResult};
use crate::slug;

/// A stored JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A key and its document, as yielded by listings.
pub type Entry = (String, Document);

/// Lazy sequence of entries.
pub type EntryStream<'a> = BoxStream<'a, StorageResult<Entry>>;

/// Lazy sequence of keys.
pub type KeyStream<'a> = BoxStream<'a, StorageResult<String>>;

/// Lazy sequence of documents.
pub type ValueStream<'a> = BoxStream<'a, StorageResult<Document>>;

/// Namespaced JSON document store.
///
/// Namespaces and keys must be slugs (see [`crate::slug`]); every operation
/// fails with [`StorageError::InvalidSlug`] before touching the backend when
/// they are not. A missing document is `Ok(None)` / `Ok(false)`, never an
/// error.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Stream every entry of a namespace.
    ///
    /// A namespace that does not exist yields nothing.
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a>;

    /// Insert or fully replace the document at `namespace`/`key`.
    ///
    /// Creates the namespace if it does not exist.
    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()>;

    /// Delete a document.
    ///
    /// Returns `true` if the document existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Stream every key of a namespace.
    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        self.entries(namespace).map_ok(|(key, _)| key).boxed()
    }

    /// Stream every document of a namespace.
    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        self.entries(namespace).map_ok(|(_, value)| value).boxed()
    }

    /// Check whether a document exists.
    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    /// Get a document.
    ///
    /// Returns `None` if it does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        let mut entries = self.entries(namespace);
        while let Some((candidate, value)) = entries.try_next().await? {
            if candidate == key {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Shallow-merge `patch` over an existing document and store the result.
    ///
    /// Top-level fields of `patch` replace those of the stored document;
    /// nested objects are replaced, not merged. Returns the merged document.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ItemDoesNotExist`] if there is no document to
    /// update.
    async fn update(&self, namespace: &str, key: &str, patch: Document) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        let Some(current) = self.get(namespace, key).await? else {
            return Err(StorageError::item_does_not_exist(namespace, key));
        };
        let merged = merge(current, patch);
        self.set(namespace, key, merged.clone()).await?;
        Ok(merged)
    }
}

/// Shallow merge: every top-level field of `patch` overwrites `base`.
#[must_use]
pub fn merge(mut base: Document, patch: Document) -> Document {
    base.extend(patch);
    base
}

/// Closure-based queries over any [`Storage`].
pub trait StorageExt: Storage {
    /// Return the first entry for which `predicate` holds.
    fn find<'a, F>(
        &'a self,
        namespace: &'a str,
        mut predicate: F,
    ) -> BoxFuture<'a, StorageResult<Option<Entry>>>
    where
        F: FnMut(&Document, &str) -> bool + Send + 'a,
    {
        let mut entries = self.entries(namespace);
        async move {
            while let Some((key, value)) = entries.try_next().await? {
                if predicate(&value, key.as_str()) {
                    return Ok(Some((key, value)));
                }
            }
            Ok(None)
        }
        .boxed()
    }

    /// Stream the entries for which `predicate` holds.
    fn filter<'a, F>(&'a self, namespace: &'a str, mut predicate: F) -> EntryStream<'a>
    where
        F: FnMut(&Document, &str) -> bool + Send + 'a,
    {
        self.entries(namespace)
            .try_filter(move |(key, value)| future::ready(predicate(value, key.as_str())))
            .boxed()
    }

    /// Stream `(key, transform(document, key))` for every entry.
    fn map<'a, T, F>(
        &'a self,
        namespace: &'a str,
        mut transform: F,
    ) -> BoxStream<'a, StorageResult<(String, T)>>
    where
        T: Send + 'a,
        F: FnMut(Document, &str) -> T + Send + 'a,
    {
        self.entries(namespace)
            .map_ok(move |(key, value)| {
                let mapped = transform(value, key.as_str());
                (key, mapped)
            })
            .boxed()
    }
}

impl<S: Storage + ?Sized> StorageExt for S {}
