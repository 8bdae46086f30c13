//! Storage error types
//!
//! Every failure in the store, the identifier scheme and the codec ends up
//! as one of these variants.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or writing the archive
#[derive(Error, Debug)]
pub enum StorageError {
    /// The filesystem refused a read, write or create
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    /// A document could not be rendered to canonical text
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Stored bytes are not valid serialized content
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// No backing file for the requested identifier
    #[error("Not found: {kind} {id} ({path:?})")]
    NotFound {
        kind: &'static str,
        id: String,
        path: PathBuf,
    },

    /// An identifier does not have the expected shape
    #[error("Invalid identifier format: {0}")]
    Format(String),

    /// The query id embedded in a result id does not survive re-parsing
    #[error("Bad result encountered, hash mismatch: {0}")]
    Integrity(String),

    /// A result file with the same identifier already exists
    #[error("Result already exists: {0}")]
    Collision(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Decoding(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
