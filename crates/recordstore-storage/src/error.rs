//! Storage error types for recordstore-storage.
//!
//! [`StorageError`] covers the adapter's own failure modes (unmappable field
//! types, lookups of entities that were never created) and wraps backend
//! failures, which are propagated unchanged and never retried.

use recordstore_core::CoreError;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A field's declared type has no storage mapping on this backend.
    #[error("cannot map field '{field}' of type {ty} to a storage type")]
    UnsupportedType { field: String, ty: String },

    /// Two fields of a record type map to the same column name.
    #[error("fields of record type '{record}' both map to column '{column}'")]
    ColumnCollision { record: String, column: String },

    /// A field value cannot be stored faithfully by this backend.
    #[error("cannot store value of field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A read-only entity lookup named a record type never created.
    #[error("no storage entity named '{0}'")]
    UnknownEntity(String),

    /// The record model rejected a value.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The SQLite engine reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A store configuration or URI could not be interpreted.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Stored data does not have the shape the adapter expects.
    #[error("integrity error: {reason}")]
    Integrity { reason: String },
}
