//! Directory-per-namespace file backend.
//!
//! Layout: `<root>/<namespace>/<key>.json`, one compact JSON object per
//! file. Slug validation guarantees every path component stays inside
//! `root`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_stream::try_stream;
use async_trait::async_trait;
use tracing::{trace, warn};

use crate::error::StorageResult;
use crate::slug;
use crate::storage::{Document, EntryStream, Storage};

const EXTENSION: &str = "json";

/// Stores each document as its own JSON file.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
}

impl FileSystemStorage {
    /// Store documents under `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    fn item_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace).join(format!("{key}.{EXTENSION}"))
    }

    /// Sorted keys of the `.json` files in a namespace directory.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        let mut dir = match tokio::fs::read_dir(self.namespace_dir(namespace)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if slug::is_valid_slug(stem) {
                keys.push(stem.to_owned());
            } else {
                trace!(path = %path.display(), "Skipping file with non-slug name");
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }

    /// Read a document. Missing files and non-object JSON read as `None`.
    async fn read_item(path: &Path) -> StorageResult<Option<Document>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<serde_json::Value>(&bytes)? {
            serde_json::Value::Object(document) => Ok(Some(document)),
            _ => {
                warn!(path = %path.display(), "Ignoring file that is not a JSON object");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    fn entries<'a>(&'a self, namespace: &'a str) -> EntryStream<'a> {
        let stream = try_stream! {
            slug::validate_namespace(namespace)?;
            for key in self.list_keys(namespace).await? {
                let path = self.item_path(namespace, &key);
                if let Some(value) = Self::read_item(&path).await? {
                    yield (key, value);
                }
            }
        };
        Box::pin(stream)
    }

    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Document>> {
        slug::validate(namespace, key)?;
        Self::read_item(&self.item_path(namespace, key)).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Document) -> StorageResult<()> {
        slug::validate(namespace, key)?;
        tokio::fs::create_dir_all(self.namespace_dir(namespace)).await?;
        let bytes = serde_json::to_vec(&value)?;
        tokio::fs::write(self.item_path(namespace, key), bytes).await?;
        trace!(namespace, key, "Wrote document file");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        slug::validate(namespace, key)?;
        match tokio::fs::remove_file(self.item_path(namespace, key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
