// localdb-core/src/error.rs
//! Error types for the document store.

use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum LocalDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store not initialized, call init() first")]
    NotInitialized,

    #[error("Collection already exists: {0}")]
    CollectionExists(String),

    #[error("Document must be a JSON object")]
    InvalidDocument,

    #[error("Document id already exists: {0}")]
    DuplicateId(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Update patch must be a JSON object")]
    InvalidPatch,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, LocalDbError>;
