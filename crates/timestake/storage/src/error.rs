use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// A create-op targeted an occupied key.
    #[error("record already exists: {0}")]
    AlreadyExists(String),

    /// An update-op's expected version did not match the stored version.
    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Lost an optimistic race: re-reading and re-validating may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::AlreadyExists(_) | StorageError::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Serialization(value.to_string())
    }
}
