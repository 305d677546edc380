//! Backend that keeps every namespace in one JSON file.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_stream::try_stream;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};
use crate::slug;
use crate::storage::{Document, EntryStream, Storage, merge};

type Container = BTreeMap<String, BTreeMap<String, Document>>;

/// Stores `{namespace: {key: document}}` in a single file.
///
/// Every write rewrites the whole file, so this suits small data sets.
/// Operations are serialised through an async mutex; the file itself is
/// replaced atomically via a sibling temporary file.
#[derive(Debug)]
pub struct SingleFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SingleFileStorage {
    /// Use the file at `path`. A missing file is an empty store.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<Container> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Container::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes)? {
            value @ serde_json::Value::Object(_) => Ok(serde_json::from_value(value)?),
            _ => {
                warn!(
                    path = %self.path.display(),
                    "Storage file is not a JSON object, treating as empty"
                );
                Ok(Container::new())
            }
        }
    }

    async fn save(&self, container: &Container) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(container)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), namespaces = container.len(), "Saved storage file");
        Ok(())
    }
}

#[async_trait]
impl Storage for SingleFileStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            let snapshot = {
                let _guard = self.lock.lock().await;
                self.load().await?.remove(namespace).unwrap_or_default()
            };
            for entry in snapshot {
                yield entry;
            }
        };
        Box::pin(stream)
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        let _guard = self.lock.lock().await;
        let mut container = self.load().await?;
        Ok(container.get_mut(namespace).and_then(|ns| ns.remove(key)))
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        let _guard = self.lock.lock().await;
        let mut container = self.load().await?;
        container
            .entry(namespace.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
        self.save(&container).await
    }

    async fn update(
        &self,
        namespace: &str,
        key: &str,
        patch: Document,
    ) -> StorageResult<Document> {
        slug::validate(namespace, key)?;
        let _guard = self.lock.lock().await;
        let mut container = self.load().await?;
        let Some(slot) = container.get_mut(namespace).and_then(|ns| ns.get_mut(key)) else {
            return Err(StorageError::item_does_not_exist(namespace, key));
        };
        let merged = merge(slot.clone(), patch);
        *slot = merged.clone();
        self.save(&container).await?;
        Ok(merged)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        let _guard = self.lock.lock().await;
        let mut container = self.load().await?;
        let Some(ns) = container.get_mut(namespace) else {
            return Ok(false);
        };
        if ns.remove(key).is_none() {
            return Ok(false);
        }
        if ns.is_empty() {
            container.remove(namespace);
        }
        self.save(&container).await?;
        Ok(true)
    }
}
