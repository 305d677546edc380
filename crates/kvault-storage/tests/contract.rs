//! Contract tests run against every backend and adapter.

use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use kvault_storage::{
    CacheStorage, Document, Entry, EventStorage, FileSystemStorage, MemoryStorage, MultiStorage,
    SingleFileStorage, Storage, StorageError, StorageExt, StorageResult, ValidatorStorage,
};
use kvault_test::{doc, memory_store, setup_test_logging_default, test_dir};
use serde_json::json;

async fn check_set_get_has(store: &dyn Storage) {
    store.set("items", "1", doc(json!({"a": 1, "nested": {"b": [1, 2]}}))).await.unwrap();
    assert_eq!(
        store.get("items", "1").await.unwrap(),
        Some(doc(json!({"a": 1, "nested": {"b": [1, 2]}})))
    );
    assert!(store.has("items", "1").await.unwrap());
}

async fn check_missing(store: &dyn Storage) {
    assert!(store.get("items", "missing").await.unwrap().is_none());
    assert!(!store.has("items", "missing").await.unwrap());
    assert!(!store.delete("items", "missing").await.unwrap());
    assert!(store.get("empty-ns", "missing").await.unwrap().is_none());
    let keys: Vec<String> = store.keys("empty-ns").try_collect().await.unwrap();
    assert!(keys.is_empty());
}

async fn check_update(store: &dyn Storage) {
    store.set("items", "2", doc(json!({"a": 1, "b": {"c": 1}}))).await.unwrap();
    let merged = store
        .update("items", "2", doc(json!({"b": {"d": 2}, "e": 3})))
        .await
        .unwrap();
    assert_eq!(merged, doc(json!({"a": 1, "b": {"d": 2}, "e": 3})));
    assert_eq!(store.get("items", "2").await.unwrap(), Some(merged));

    assert!(matches!(
        store.update("items", "nope", doc(json!({"a": 1}))).await,
        Err(StorageError::ItemDoesNotExist { .. })
    ));
}

async fn check_delete(store: &dyn Storage) {
    store.set("items", "3", doc(json!({}))).await.unwrap();
    assert!(store.delete("items", "3").await.unwrap());
    assert!(!store.has("items", "3").await.unwrap());
    assert!(!store.delete("items", "3").await.unwrap());
}

async fn check_listings(store: &dyn Storage) {
    store.set("list", "a", doc(json!({"n": 1}))).await.unwrap();
    store.set("list", "b", doc(json!({"n": 2}))).await.unwrap();

    let mut keys: Vec<String> = store.keys("list").try_collect().await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);

    let mut entries: Vec<Entry> = store.entries("list").try_collect().await.unwrap();
    entries.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(
        entries,
        vec![
            ("a".to_owned(), doc(json!({"n": 1}))),
            ("b".to_owned(), doc(json!({"n": 2}))),
        ]
    );

    let values: Vec<Document> = store.values("list").try_collect().await.unwrap();
    assert_eq!(values.len(), 2);

    let found = store.find("list", |value, _| value["n"] == 2).await.unwrap();
    assert_eq!(found.map(|(key, _)| key), Some("b".to_owned()));

    let filtered: Vec<Entry> = store
        .filter("list", |_, key| key == "a")
        .try_collect()
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);

    let mut doubled: Vec<(String, i64)> = store
        .map("list", |value, _| value["n"].as_i64().unwrap_or_default().saturating_mul(2))
        .try_collect()
        .await
        .unwrap();
    doubled.sort();
    assert_eq!(doubled, vec![("a".to_owned(), 2), ("b".to_owned(), 4)]);
}

async fn check_invalid_slugs(store: &dyn Storage) {
    let bad = [
        ("items", "a;b"),
        ("Items", "1"),
        ("-items", "1"),
        ("", "1"),
        ("items", ""),
    ];
    for (namespace, key) in bad {
        assert!(matches!(
            store.get(namespace, key).await,
            Err(StorageError::InvalidSlug(_))
        ));
        assert!(matches!(
            store.has(namespace, key).await,
            Err(StorageError::InvalidSlug(_))
        ));
        assert!(matches!(
            store.set(namespace, key, doc(json!({}))).await,
            Err(StorageError::InvalidSlug(_))
        ));
        assert!(matches!(
            store.update(namespace, key, doc(json!({}))).await,
            Err(StorageError::InvalidSlug(_))
        ));
        assert!(matches!(
            store.delete(namespace, key).await,
            Err(StorageError::InvalidSlug(_))
        ));
    }
    for namespace in ["a/b", "UP", "a--b"] {
        let keys: StorageResult<Vec<String>> = store.keys(namespace).try_collect().await;
        assert!(matches!(keys, Err(StorageError::InvalidSlug(_))));
        let values: StorageResult<Vec<Document>> = store.values(namespace).try_collect().await;
        assert!(matches!(values, Err(StorageError::InvalidSlug(_))));
        let entries: StorageResult<Vec<Entry>> = store.entries(namespace).try_collect().await;
        assert!(matches!(entries, Err(StorageError::InvalidSlug(_))));
    }
}

async fn check_contract(store: Arc<dyn Storage>) {
    setup_test_logging_default();
    check_set_get_has(store.as_ref()).await;
    check_missing(store.as_ref()).await;
    check_update(store.as_ref()).await;
    check_delete(store.as_ref()).await;
    check_listings(store.as_ref()).await;
    check_invalid_slugs(store.as_ref()).await;
}

#[tokio::test]
async fn test_memory_contract() {
    check_contract(memory_store()).await;
}

#[tokio::test]
async fn test_filesystem_contract() {
    let dir = test_dir();
    check_contract(Arc::new(FileSystemStorage::new(dir.path()))).await;
}

#[tokio::test]
async fn test_single_file_contract() {
    let dir = test_dir();
    check_contract(Arc::new(SingleFileStorage::new(dir.path().join("data.json")))).await;
}

#[tokio::test]
async fn test_multi_contract() {
    check_contract(Arc::new(MultiStorage::new(vec![memory_store(), memory_store()]))).await;
}

#[tokio::test]
async fn test_cache_contract() {
    check_contract(Arc::new(CacheStorage::new(
        memory_store(),
        Some(Duration::from_secs(60)),
    )))
    .await;
}

#[tokio::test]
async fn test_cache_without_ttl_contract() {
    check_contract(Arc::new(CacheStorage::new(memory_store(), None))).await;
}

#[tokio::test]
async fn test_event_contract() {
    check_contract(Arc::new(EventStorage::new(memory_store()))).await;
}

#[tokio::test]
async fn test_validator_contract() {
    let accept_all = Arc::new(|_: &Document| -> Result<(), String> { Ok(()) });
    let storage = ["items", "empty-ns", "list"]
        .into_iter()
        .fold(ValidatorStorage::new(memory_store()), |storage, namespace| {
            storage.with_validator(namespace, accept_all.clone())
        });
    check_contract(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_stacked_contract() {
    let dir = test_dir();
    let fan_out = MultiStorage::new(vec![
        memory_store(),
        Arc::new(FileSystemStorage::new(dir.path().join("fs"))),
        Arc::new(SingleFileStorage::new(dir.path().join("single.json"))),
    ]);
    let events = EventStorage::new(Arc::new(fan_out));
    let cache = CacheStorage::new(Arc::new(events), Some(Duration::from_secs(60)));
    check_contract(Arc::new(cache)).await;
}

#[tokio::test]
async fn test_memory_store_concrete_type() {
    let store = MemoryStorage::new();
    store.set("items", "1", doc(json!({}))).await.unwrap();
    store.clear(Some("items")).unwrap();
    assert!(!store.has("items", "1").await.unwrap());
}
