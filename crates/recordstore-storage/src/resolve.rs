//! Key-field predicate construction shared by all backends.
//!
//! [`key_predicates`] walks a record's key fields and asks a backend-specific
//! [`KeyPredicates`] implementation for one equality predicate per scalar key
//! and for the predicates standing in for a nested key record. The walk
//! decides when resolution is impossible: a type without key fields, or a
//! nested key record that cannot itself be resolved.

use recordstore_core::{FieldSpec, Record, Value};

use crate::error::StorageError;

/// Backend vocabulary for identity predicates.
pub trait KeyPredicates {
    type Predicate;

    /// Equality predicate for a scalar key field.
    fn scalar(&mut self, field: &FieldSpec, value: &Value)
        -> Result<Self::Predicate, StorageError>;

    /// Predicates matching a nested key record, or `None` if the nested
    /// record cannot be resolved (which makes the parent unresolvable).
    fn nested(
        &mut self,
        field: &FieldSpec,
        record: &Record,
    ) -> Result<Option<Vec<Self::Predicate>>, StorageError>;

    /// Predicate for a nested key field holding null.
    fn nested_null(&mut self, field: &FieldSpec) -> Result<Self::Predicate, StorageError>;
}

/// Builds the conjunction of key predicates identifying `record`.
///
/// Returns `None` when the record type has no key fields or a nested key
/// record cannot be resolved.
pub fn key_predicates<B: KeyPredicates>(
    backend: &mut B,
    record: &Record,
) -> Result<Option<Vec<B::Predicate>>, StorageError> {
    if !record.record_type().has_key_fields() {
        tracing::debug!(record = record.record_type().name(), "no key fields");
        return Ok(None);
    }

    let mut predicates = Vec::new();
    for (field, value) in record.key_entries() {
        match value {
            Value::Record(nested) => match backend.nested(field, nested)? {
                Some(nested_predicates) => predicates.extend(nested_predicates),
                None => return Ok(None),
            },
            Value::Null if field.ty().is_record() => predicates.push(backend.nested_null(field)?),
            _ => predicates.push(backend.scalar(field, value)?),
        }
    }
    Ok(Some(predicates))
}
