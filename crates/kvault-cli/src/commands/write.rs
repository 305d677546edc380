//! Mutating subcommands.

use kvault_storage::{Document, Storage, StorageError};

use super::{Outcome, Output};
use crate::theme::Theme;

/// Store `document` at `namespace/key`, replacing any existing one.
pub(crate) async fn set(
    store: &dyn Storage,
    namespace: &str,
    key: &str,
    document: Document,
) -> anyhow::Result<Outcome> {
    store.set(namespace, key, document).await?;
    eprintln!(
        "{}",
        Theme::success(&format!("Stored {}", Theme::address(namespace, key)))
    );
    Ok(Outcome::Found)
}

/// Merge `patch` into the document at `namespace/key` and print the result.
pub(crate) async fn update(
    store: &dyn Storage,
    namespace: &str,
    key: &str,
    patch: Document,
    output: Output,
) -> anyhow::Result<Outcome> {
    match store.update(namespace, key, patch).await {
        Ok(merged) => {
            output.print_document(merged)?;
            Ok(Outcome::Found)
        },
        Err(StorageError::ItemDoesNotExist { .. }) => {
            eprintln!(
                "{}",
                Theme::error(&format!(
                    "Nothing to update at {}",
                    Theme::address(namespace, key)
                ))
            );
            Ok(Outcome::Missing)
        },
        Err(e) => Err(e.into()),
    }
}

/// Delete the document at `namespace/key`.
pub(crate) async fn delete(
    store: &dyn Storage,
    namespace: &str,
    key: &str,
) -> anyhow::Result<Outcome> {
    let existed = store.delete(namespace, key).await?;
    let address = Theme::address(namespace, key);
    if existed {
        eprintln!("{}", Theme::success(&format!("Deleted {address}")));
    } else {
        eprintln!("{}", Theme::warning(&format!("{address} did not exist")));
    }
    Ok(Outcome::from_found(existed))
}
