//! Namespace and key validation.
//!
//! Every namespace and key passed to a store must be a slug: one or more
//! lowercase alphanumeric segments joined by single hyphens. The grammar
//! excludes path separators, dots and shell metacharacters, so a valid slug
//! can be used verbatim as a file name or SQL identifier fragment.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{StorageError, StorageResult};

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("invalid regex"));

/// Returns `true` if `input` is a valid slug.
#[must_use]
pub fn is_valid_slug(input: &str) -> bool {
    SLUG.is_match(input)
}

/// Validate a namespace.
///
/// # Errors
///
/// Returns [`StorageError::InvalidSlug`] if the namespace is not a slug.
pub fn validate_namespace(namespace: &str) -> StorageResult<()> {
    if is_valid_slug(namespace) {
        Ok(())
    } else {
        Err(StorageError::InvalidSlug(format!(
            "namespace {namespace:?} is not a valid slug"
        )))
    }
}

/// Validate a key.
///
/// # Errors
///
/// Returns [`StorageError::InvalidSlug`] if the key is not a slug.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if is_valid_slug(key) {
        Ok(())
    } else {
        Err(StorageError::InvalidSlug(format!(
            "key {key:?} is not a valid slug"
        )))
    }
}

/// Validate a namespace and key pair.
///
/// # Errors
///
/// Returns [`StorageError::InvalidSlug`] if either is not a slug.
pub fn validate(namespace: &str, key: &str) -> StorageResult<()> {
    validate_namespace(namespace)?;
    validate_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_slugs() {
        for input in ["a", "items", "0", "user-42", "a-b-c", "9lives"] {
            assert!(is_valid_slug(input), "{input:?} should be valid");
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for input in [
            "",
            "-a",
            "a-",
            "a--b",
            "Items",
            "a_b",
            "a.b",
            "a b",
            "../etc",
            "a/b",
            "a;rm",
            "ä",
            "a\n",
        ] {
            assert!(!is_valid_slug(input), "{input:?} should be invalid");
        }
    }

    #[test]
    fn test_validate_reports_offending_part() {
        let err = validate("ok", "Bad").unwrap_err();
        assert!(matches!(err, StorageError::InvalidSlug(ref m) if m.contains("key")));

        let err = validate("Bad", "ok").unwrap_err();
        assert!(matches!(err, StorageError::InvalidSlug(ref m) if m.contains("namespace")));
    }
}
