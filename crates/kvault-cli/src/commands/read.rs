//! Read-only subcommands.

use futures::TryStreamExt;
use kvault_storage::{Storage, StorageExt};
use serde_json::Value;

use super::{Condition, Outcome, Output};

/// Print every key in `namespace`, one per line.
pub(crate) async fn keys(store: &dyn Storage, namespace: &str) -> anyhow::Result<Outcome> {
    let mut keys = store.keys(namespace);
    while let Some(key) = keys.try_next().await? {
        println!("{key}");
    }
    Ok(Outcome::Found)
}

/// Print every document in `namespace`.
pub(crate) async fn values(
    store: &dyn Storage,
    namespace: &str,
    output: Output,
) -> anyhow::Result<Outcome> {
    let mut values = store.values(namespace);
    while let Some(document) = values.try_next().await? {
        output.print_document(document)?;
    }
    Ok(Outcome::Found)
}

/// Print `{key, value}` pairs matching every condition.
pub(crate) async fn list(
    store: &dyn Storage,
    namespace: &str,
    conditions: Vec<Condition>,
    output: Output,
) -> anyhow::Result<Outcome> {
    let mut entries = store.filter(namespace, move |document, _| {
        conditions.iter().all(|condition| condition.matches(document))
    });
    while let Some((key, document)) = entries.try_next().await? {
        output.print_entry(key, document)?;
    }
    Ok(Outcome::Found)
}

/// Print the first entry matching every condition.
pub(crate) async fn find(
    store: &dyn Storage,
    namespace: &str,
    conditions: Vec<Condition>,
    output: Output,
) -> anyhow::Result<Outcome> {
    let found = store
        .find(namespace, move |document, _| {
            conditions.iter().all(|condition| condition.matches(document))
        })
        .await?;
    match found {
        Some((key, document)) => {
            output.print_entry(key, document)?;
            Ok(Outcome::Found)
        },
        None => Ok(Outcome::Missing),
    }
}

/// Print the document at `namespace/key`.
pub(crate) async fn get(
    store: &dyn Storage,
    namespace: &str,
    key: &str,
    output: Output,
) -> anyhow::Result<Outcome> {
    match store.get(namespace, key).await? {
        Some(document) => {
            output.print_document(document)?;
            Ok(Outcome::Found)
        },
        None => Ok(Outcome::Missing),
    }
}

/// Print `true` or `false`.
pub(crate) async fn has(
    store: &dyn Storage,
    namespace: &str,
    key: &str,
    output: Output,
) -> anyhow::Result<Outcome> {
    let found = store.has(namespace, key).await?;
    output.print(&Value::Bool(found))?;
    Ok(Outcome::from_found(found))
}

#[cfg(test)]
mod tests {
    use kvault_storage::{MemoryStorage, StorageError};
    use serde_json::json;

    use super::*;
    use crate::commands::parse_condition;

    async fn seeded() -> MemoryStorage {
        let store = MemoryStorage::new();
        for (key, status) in [("a", 0), ("b", 2), ("c", 2)] {
            store
                .set(
                    "items",
                    key,
                    json!({"status": status}).as_object().cloned().unwrap(),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_get_outcomes() {
        let store = seeded().await;
        let output = Output::default();
        assert_eq!(
            get(&store, "items", "a", output).await.unwrap(),
            Outcome::Found
        );
        assert_eq!(
            get(&store, "items", "zz", output).await.unwrap(),
            Outcome::Missing
        );
    }

    #[tokio::test]
    async fn test_has_outcomes() {
        let store = seeded().await;
        let output = Output::default();
        assert_eq!(
            has(&store, "items", "b", output).await.unwrap(),
            Outcome::Found
        );
        assert_eq!(
            has(&store, "items", "zz", output).await.unwrap(),
            Outcome::Missing
        );
    }

    #[tokio::test]
    async fn test_find_outcomes() {
        let store = seeded().await;
        let output = Output::default();
        let matching = vec![parse_condition("status=2").unwrap()];
        let none = vec![parse_condition("status=9").unwrap()];
        assert_eq!(
            find(&store, "items", matching, output).await.unwrap(),
            Outcome::Found
        );
        assert_eq!(
            find(&store, "items", none, output).await.unwrap(),
            Outcome::Missing
        );
    }

    #[tokio::test]
    async fn test_listings_succeed() {
        let store = seeded().await;
        let output = Output::default();
        assert_eq!(keys(&store, "items").await.unwrap(), Outcome::Found);
        assert_eq!(values(&store, "items", output).await.unwrap(), Outcome::Found);
        assert_eq!(
            list(&store, "items", Vec::new(), output).await.unwrap(),
            Outcome::Found
        );
    }

    #[tokio::test]
    async fn test_invalid_namespace_is_an_error() {
        let store = seeded().await;
        let err = keys(&store, "Bad Namespace").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::InvalidSlug(_))
        ));
    }
}
