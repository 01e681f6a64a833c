//! Error types for durable storage.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the durable storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Errors coming from the blob store.
    #[error("blob store error: {0}")]
    BlobStore(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The persisted envelope was written by an unknown version.
    #[error("unsupported storage version: {0}")]
    UnsupportedVersion(u32),

    /// The blob name cannot be used as a storage key.
    #[error("invalid blob name: {0}")]
    InvalidName(String),
}

impl From<std::io::Error> for StorageError {
    fn from(error: std::io::Error) -> Self {
        Self::BlobStore(error.to_string())
    }
}
