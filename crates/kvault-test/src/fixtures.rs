//! Test fixtures for documents and stores.

use std::sync::Arc;

use kvault_storage::{Document, MemoryStorage, Storage};
use serde_json::Value;

/// Build a [`Document`] from a `json!` object literal.
///
/// # Panics
///
/// Panics if `value` is not a JSON object.
#[must_use]
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(document) => document,
        other => panic!("fixture must be a JSON object, got {other}"),
    }
}

/// Build an entry tuple.
///
/// # Panics
///
/// Panics if `value` is not a JSON object.
#[must_use]
pub fn entry(key: &str, value: Value) -> (String, Document) {
    (key.to_owned(), doc(value))
}

/// An empty in-memory store behind a trait object.
#[must_use]
pub fn memory_store() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::new())
}

/// An in-memory store pre-filled with `entries` in `namespace`.
///
/// # Panics
///
/// Panics if a namespace or key is not a valid slug.
pub async fn seeded_store(namespace: &str, entries: &[(&str, Value)]) -> Arc<MemoryStorage> {
    let store = Arc::new(MemoryStorage::new());
    for (key, value) in entries {
        store
            .set(namespace, key, doc(value.clone()))
            .await
            .expect("Failed to seed store");
    }
    store
}
