//! Storage error types

use thiserror::Error;

/// Errors that can occur while persisting an accepted upload
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The result handed to the writer was never accepted
    #[error("Refusing to store a file that did not pass validation")]
    NotAccepted,

    /// Invalid file path or stored name
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
