//! Namespace-bound view of a store.

use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, EntryStream, KeyStream, Storage, ValueStream};

/// A [`Storage`] pre-bound to one namespace.
///
/// Callers address documents by key only. Typed access is available through
/// [`get_as`](Self::get_as) and [`set_as`](Self::set_as), which convert via
/// `serde`.
///
/// # Example
///
/// ```rust,ignore
/// let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
/// let users = ScopedStorage::new(store, "users")?;
/// users.set_as("jo", &User { name: "Jo".into() }).await?;
/// let jo: Option<User> = users.get_as("jo").await?;
/// ```
#[derive(Clone)]
pub struct ScopedStorage {
    inner: Arc<dyn Storage>,
    namespace: String,
}

impl std::fmt::Debug for ScopedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStorage")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl ScopedStorage {
    /// Create a view of `store` limited to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] if the namespace is not a slug.
    pub fn new(store: Arc<dyn Storage>, namespace: impl Into<String>) -> StorageResult<Self> {
        let namespace = namespace.into();
        slug::validate_namespace(&namespace)?;
        Ok(Self {
            inner: store,
            namespace,
        })
    }

    /// The bound namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Stream every entry.
    pub fn entries(&self) -> EntryStream<'_> {
        self.inner.entries(&self.namespace)
    }

    /// Stream every key.
    pub fn keys(&self) -> KeyStream<'_> {
        self.inner.keys(&self.namespace)
    }

    /// Stream every document.
    pub fn values(&self) -> ValueStream<'_> {
        self.inner.values(&self.namespace)
    }

    /// Check whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] for a malformed key, or the
    /// backend's error.
    pub async fn has(&self, key: &str) -> StorageResult<bool> {
        self.inner.has(&self.namespace, key).await
    }

    /// Get the document at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] for a malformed key, or the
    /// backend's error.
    pub async fn get(&self, key: &str) -> StorageResult<Option<Document>> {
        self.inner.get(&self.namespace, key).await
    }

    /// Store a document at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] for a malformed key, or the
    /// backend's error.
    pub async fn set(&self, key: &str, value: Document) -> StorageResult<()> {
        self.inner.set(&self.namespace, key, value).await
    }

    /// Shallow-merge `patch` into the document at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ItemDoesNotExist`] if there is nothing to
    /// update.
    pub async fn update(&self, key: &str, patch: Document) -> StorageResult<Document> {
        self.inner.update(&self.namespace, key, patch).await
    }

    /// Delete the document at `key`. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSlug`] for a malformed key, or the
    /// backend's error.
    pub async fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(&self.namespace, key).await
    }

    // -- Typed convenience --

    /// Get the document at `key` deserialized as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if the document does not fit
    /// `T`.
    pub async fn get_as<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> StorageResult<Option<T>> {
        self.get(key)
            .await?
            .map(|document| serde_json::from_value(serde_json::Value::Object(document)))
            .transpose()
            .map_err(StorageError::from)
    }

    /// Serialize `value` and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Serialization`] if `value` does not serialize
    /// to a JSON object.
    pub async fn set_as<T: serde::Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        match serde_json::to_value(value)? {
            serde_json::Value::Object(document) => self.set(key, document).await,
            other => Err(StorageError::Serialization(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
