//! Storage wrapper that checks documents before they are written.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_stream::try_stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, EntryStream, KeyStream, Storage, ValueStream, merge};

/// Checks a document. `Err` carries a message for the caller.
pub trait DocumentValidator: Send + Sync {
    /// Validate `document`.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the document is rejected.
    fn validate(&self, document: &Document) -> Result<(), String>;
}

impl<F> DocumentValidator for F
where
    F: Fn(&Document) -> Result<(), String> + Send + Sync,
{
    fn validate(&self, document: &Document) -> Result<(), String> {
        self(document)
    }
}

/// Restricts a store to a fixed set of namespaces, each with a validator.
///
/// Any operation on a namespace without a validator fails with
/// [`StorageError::UnrecognizedNamespace`]. `set` validates the document;
/// `update` validates the merged document before writing it.
pub struct ValidatorStorage {
    inner: Arc<dyn Storage>,
    validators: HashMap<String, Arc<dyn DocumentValidator>>,
}

impl fmt::Debug for ValidatorStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut namespaces: Vec<&String> = self.validators.keys().collect();
        namespaces.sort();
        f.debug_struct("ValidatorStorage")
            .field("namespaces", &namespaces)
            .finish_non_exhaustive()
    }
}

impl ValidatorStorage {
    /// Wrap `inner` with no namespaces allowed yet.
    #[must_use]
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            validators: HashMap::new(),
        }
    }

    /// Allow `namespace`, checking its documents with `validator`.
    #[must_use]
    pub fn with_validator(
        mut self,
        namespace: impl Into<String>,
        validator: Arc<dyn DocumentValidator>,
    ) -> Self {
        self.validators.insert(namespace.into(), validator);
        self
    }

    fn validator(&self, namespace: &str) -> StorageResult<&Arc<dyn DocumentValidator>> {
        self.validators
            .get(namespace)
            .ok_or_else(|| StorageError::UnrecognizedNamespace(namespace.to_owned()))
    }

    fn check(&self, namespace: &str, document: &Document) -> StorageResult<()> {
        self.validator(namespace)?
            .validate(document)
            .map_err(|message| {
                debug!(namespace, %message, "Document rejected");
                StorageError::Validation {
                    namespace: namespace.to_owned(),
                    message,
                }
            })
    }
}

#[async_trait]
impl Storage for ValidatorStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            self.validator(namespace)?;
            let mut upstream = self.inner.entries(namespace);
            while let Some(entry) = upstream.try_next().await? {
                yield entry;
            }
        };
        Box::pin(stream)
    }

    fn keys<'a>(&'a self, namespace: &'a str) -> KeyStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            self.validator(namespace)?;
            let mut upstream = self.inner.keys(namespace);
            while let Some(key) = upstream.try_next().await? {
                yield key;
            }
        };
        Box::pin(stream)
    }

    fn values<'a>(&'a self, namespace: &'a str) -> ValueStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            self.validator(namespace)?;
            let mut upstream = self.inner.values(namespace);
            while let Some(value) = upstream.try_next().await? {
                yield value;
            }
        };
        Box::pin(stream)
    }

    async fn has(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        self.validator(namespace)?;
        self.inner.has(namespace, key).await
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        self.validator(namespace)?;
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        self.check(namespace, &value)?;
        self.inner.set(namespace, key, value).await
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        self.validator(namespace)?;
        let Some(current) = self.inner.get(namespace, key).await? else {
            return Err(StorageError::item_does_not_exist(namespace, key));
        };
        let merged = merge(current, patch);
        self.check(namespace, &merged)?;
        self.inner.set(namespace, key, merged.clone()).await?;
        Ok(merged)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        self.validator(namespace)?;
        self.inner.delete(namespace, key).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::memory::MemoryStorage;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn requires_name(document: &Document) -> Result<(), String> {
        match document.get("name") {
            Some(serde_json::Value::String(_)) => Ok(()),
            _ => Err("name must be a string".to_owned()),
        }
    }

    fn validated() -> (Arc<MemoryStorage>, ValidatorStorage) {
        let backend = Arc::new(MemoryStorage::new());
        let storage = ValidatorStorage::new(backend.clone())
            .with_validator("users", Arc::new(requires_name));
        (backend, storage)
    }

    #[tokio::test]
    async fn test_set_validates() {
        let (backend, storage) = validated();
        storage
            .set("users", "jo", doc(json!({"name": "Jo"})))
            .await
            .unwrap();

        let result = storage.set("users", "al", doc(json!({"name": 5}))).await;
        assert!(matches!(
            result,
            Err(StorageError::Validation { ref message, .. }) if message == "name must be a string"
        ));
        assert!(!backend.has("users", "al").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_validates_merged_document() {
        let (_backend, storage) = validated();
        storage
            .set("users", "jo", doc(json!({"name": "Jo", "age": 30})))
            .await
            .unwrap();

        let merged = storage
            .update("users", "jo", doc(json!({"age": 31})))
            .await
            .unwrap();
        assert_eq!(merged, doc(json!({"name": "Jo", "age": 31})));

        let result = storage.update("users", "jo", doc(json!({"name": null}))).await;
        assert!(matches!(result, Err(StorageError::Validation { .. })));
        assert_eq!(
            storage.get("users", "jo").await.unwrap(),
            Some(doc(json!({"name": "Jo", "age": 31})))
        );
    }

    #[tokio::test]
    async fn test_update_missing_item() {
        let (_backend, storage) = validated();
        let result = storage.update("users", "jo", doc(json!({"name": "Jo"}))).await;
        assert!(matches!(result, Err(StorageError::ItemDoesNotExist { .. })));
    }

    #[tokio::test]
    async fn test_unmapped_namespace_is_rejected() {
        let (_backend, storage) = validated();
        assert!(matches!(
            storage.get("posts", "1").await,
            Err(StorageError::UnrecognizedNamespace(ref ns)) if ns == "posts"
        ));
        assert!(matches!(
            storage.delete("posts", "1").await,
            Err(StorageError::UnrecognizedNamespace(_))
        ));
        let keys: StorageResult<Vec<String>> = storage.keys("posts").try_collect().await;
        assert!(matches!(keys, Err(StorageError::UnrecognizedNamespace(_))));
    }

    #[tokio::test]
    async fn test_slug_checked_before_namespace() {
        let (_backend, storage) = validated();
        assert!(matches!(
            storage.get("Posts", "1").await,
            Err(StorageError::InvalidSlug(_))
        ));
    }
}
