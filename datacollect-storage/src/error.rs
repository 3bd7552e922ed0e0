//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from the DuckDB-backed event/entity adapters.
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Database error from the SQLite-backed auth adapter.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity or audit record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// `setExternalId` targeted an id already bound to a different entity
    /// in the same tenant.
    #[error("external id {0} already bound to a different entity")]
    DuplicateExternalId(String),

    /// A malformed search criterion (e.g. two non-range operators on one key).
    #[error("invalid search criteria: {0}")]
    InvalidSearchCriteria(String),
}
