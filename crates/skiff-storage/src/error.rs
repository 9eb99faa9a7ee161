//! Storage error types.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Object not found in the store.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Reference not found.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// Malformed or corrupt object data.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// Malformed reference.
    #[error("invalid ref: {0}")]
    InvalidRef(String),
}

/// A specialized Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
