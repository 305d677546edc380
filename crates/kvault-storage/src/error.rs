//! Storage error types.

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The namespace or key is not a valid slug.
    #[error("invalid slug: {0}")]
    InvalidSlug(String),

    /// An update targeted a document that does not exist.
    #[error("item does not exist: {namespace}/{key}")]
    ItemDoesNotExist {
        /// Namespace of the missing document.
        namespace: String,
        /// Key of the missing document.
        key: String,
    },

    /// A pre-operation listener vetoed the mutation.
    #[error("operation prevented: {0}")]
    OperationPrevented(String),

    /// No validator is registered for the namespace.
    #[error("unrecognized namespace: {0}")]
    UnrecognizedNamespace(String),

    /// A document failed validation.
    #[error("validation failed for {namespace}: {message}")]
    Validation {
        /// Namespace whose validator rejected the document.
        namespace: String,
        /// Validator message.
        message: String,
    },

    /// An I/O operation in a backend failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Shorthand for [`StorageError::ItemDoesNotExist`].
    pub fn item_does_not_exist(namespace: &str, key: &str) -> Self {
        Self::ItemDoesNotExist {
            namespace: namespace.to_owned(),
            key: key.to_owned(),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
