//! Fan-out adapter against instrumented and failing backends.

use std::sync::Arc;

use futures::TryStreamExt;
use kvault_storage::{Entry, MultiStorage, Storage, StorageError, StorageResult};
use kvault_test::{CountingStorage, FailingStorage, doc, entry, memory_store, seeded_store};
use serde_json::json;

#[tokio::test]
async fn test_conflicting_backends() {
    let first = seeded_store("ns", &[("x", json!({"a": 1}))]).await;
    let second = seeded_store("ns", &[("x", json!({"a": 2})), ("y", json!({"b": 1}))]).await;
    let multi = MultiStorage::new(vec![first as Arc<dyn Storage>, second]);

    assert_eq!(multi.get("ns", "x").await.unwrap(), Some(doc(json!({"a": 1}))));

    let entries: Vec<Entry> = multi.entries("ns").try_collect().await.unwrap();
    assert!(entries.contains(&entry("x", json!({"a": 2}))));
    assert!(entries.contains(&entry("y", json!({"b": 1}))));
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn test_writes_reach_every_backend_once() {
    let first = CountingStorage::new(memory_store());
    let second = CountingStorage::new(memory_store());
    let multi = MultiStorage::new(vec![
        Arc::new(first.clone()) as Arc<dyn Storage>,
        Arc::new(second.clone()),
    ]);

    multi.set("ns", "k", doc(json!({"v": 1}))).await.unwrap();
    multi.update("ns", "k", doc(json!({"w": 2}))).await.unwrap();
    assert!(multi.delete("ns", "k").await.unwrap());

    for backend in [&first, &second] {
        let counts = backend.counts();
        assert_eq!((counts.set, counts.update, counts.delete), (1, 1, 1));
    }
}

#[tokio::test]
async fn test_get_stops_at_first_hit() {
    let first = CountingStorage::new(memory_store());
    let second = CountingStorage::new(memory_store());
    first.set("ns", "k", doc(json!({}))).await.unwrap();
    let multi = MultiStorage::new(vec![
        Arc::new(first.clone()) as Arc<dyn Storage>,
        Arc::new(second.clone()),
    ]);

    assert!(multi.get("ns", "k").await.unwrap().is_some());
    assert!(multi.has("ns", "k").await.unwrap());

    assert_eq!(first.counts().get, 1);
    assert_eq!(second.counts().get, 0);
    assert_eq!(second.counts().has, 0);
}

#[tokio::test]
async fn test_invalid_slug_never_reaches_backends() {
    let backend = CountingStorage::new(memory_store());
    let multi = MultiStorage::new(vec![Arc::new(backend.clone()) as Arc<dyn Storage>]);

    assert!(matches!(
        multi.set("ns", "bad key", doc(json!({}))).await,
        Err(StorageError::InvalidSlug(_))
    ));
    let keys: StorageResult<Vec<String>> = multi.keys("Bad").try_collect().await;
    assert!(matches!(keys, Err(StorageError::InvalidSlug(_))));

    assert_eq!(backend.counts().writes(), 0);
    assert_eq!(backend.counts().reads(), 0);
}

#[tokio::test]
async fn test_failing_backend_fails_writes() {
    let healthy = memory_store();
    let multi = MultiStorage::new(vec![
        Arc::clone(&healthy),
        Arc::new(FailingStorage::new("disk on fire")),
    ]);

    let err = multi.set("ns", "k", doc(json!({"v": 1}))).await.unwrap_err();
    assert!(matches!(err, StorageError::Internal(ref message) if message == "disk on fire"));

    // No rollback of the backend that succeeded.
    assert!(healthy.has("ns", "k").await.unwrap());

    assert!(multi.delete("ns", "k").await.is_err());
    assert!(multi.update("ns", "k", doc(json!({}))).await.is_err());
}

#[tokio::test]
async fn test_failing_backend_fails_listings() {
    let multi = MultiStorage::new(vec![
        memory_store(),
        Arc::new(FailingStorage::new("unreachable")),
    ]);

    let keys: StorageResult<Vec<String>> = multi.keys("ns").try_collect().await;
    assert!(matches!(keys, Err(StorageError::Internal(_))));
    let entries: StorageResult<Vec<Entry>> = multi.entries("ns").try_collect().await;
    assert!(matches!(entries, Err(StorageError::Internal(_))));
}

#[tokio::test]
async fn test_get_errors_only_when_reached() {
    let first = seeded_store("ns", &[("k", json!({"v": 1}))]).await;
    let multi = MultiStorage::new(vec![
        first as Arc<dyn Storage>,
        Arc::new(FailingStorage::new("unreachable")),
    ]);

    assert!(multi.get("ns", "k").await.unwrap().is_some());
    assert!(multi.get("ns", "other").await.is_err());
}

#[tokio::test]
async fn test_nested_fan_out() {
    let leaf = memory_store();
    let inner = MultiStorage::new(vec![Arc::clone(&leaf), memory_store()]);
    let outer = MultiStorage::new(vec![Arc::new(inner), memory_store()]);

    outer.set("ns", "k", doc(json!({"v": 1}))).await.unwrap();
    assert_eq!(leaf.get("ns", "k").await.unwrap(), Some(doc(json!({"v": 1}))));

    let keys: Vec<String> = outer.keys("ns").try_collect().await.unwrap();
    assert_eq!(keys, vec!["k"]);
}
