//! Core error types for recordstore-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! violations of the record model: malformed record types and record
//! instances whose values do not fit their declared types.

use thiserror::Error;

/// Core errors produced by the recordstore-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A record type declares the same field name twice.
    #[error("duplicate field '{field}' in record type '{record}'")]
    DuplicateField { record: String, field: String },

    /// An enumeration declares the same member twice, or no members at all.
    #[error("invalid enum '{name}': {reason}")]
    InvalidEnum { name: String, reason: String },

    /// A value was supplied for a field the record type does not declare.
    #[error("unknown field '{field}' for record type '{record}'")]
    UnknownField { record: String, field: String },

    /// A field without a declared default was left unset.
    #[error("missing value for field '{field}' of record type '{record}'")]
    MissingField { record: String, field: String },

    /// A value's runtime type is incompatible with the field's declared type.
    #[error("field '{field}' of record type '{record}' expects {expected}, got {actual}")]
    TypeMismatch {
        record: String,
        field: String,
        expected: String,
        actual: String,
    },
}
