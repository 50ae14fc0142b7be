//! The [`RecordStore`] trait defining the persistence contract for records.
//!
//! Every backend (relational, document store, no-op) implements this trait,
//! so call sites that persist records are agnostic to where they go. The
//! trait is synchronous: each call is a sequence of blocking backend round
//! trips, and callers sharing one adapter must serialize their calls.

use recordstore_core::{Record, RecordType};

use crate::error::StorageError;

/// The persistence contract for records.
pub trait RecordStore {
    /// Backend-assigned identifier of a stored record.
    type Id: Clone + std::fmt::Debug + PartialEq;

    /// Backend description of a storage entity (table, collection).
    type Entity: Clone + std::fmt::Debug;

    /// Returns the identifier of a stored record equivalent to `record`.
    ///
    /// Equivalence is decided by key fields only; nested key records are
    /// resolved first. Returns `None` when the record's entity was never
    /// created, when the type has no key fields, or when nothing matches.
    /// A found identifier is memoized for this record instance.
    fn resolve(&mut self, record: &Record) -> Result<Option<Self::Id>, StorageError>;

    /// Returns `true` if an equivalent record is stored.
    fn exists(&mut self, record: &Record) -> Result<bool, StorageError> {
        Ok(self.resolve(record)?.is_some())
    }

    /// Stores `record` unless an equivalent record already exists.
    ///
    /// Equivalent to `add_with(record, true)`.
    fn add(&mut self, record: &Record) -> Result<Self::Id, StorageError> {
        self.add_with(record, true)
    }

    /// Stores `record` and returns its identifier.
    ///
    /// When `check_exists` is set, an equivalent stored record is looked up
    /// first and its identifier returned without inserting. Nested records
    /// are persisted with the same policy. No transaction spans the nested
    /// inserts: a failure part-way leaves earlier inserts committed.
    fn add_with(&mut self, record: &Record, check_exists: bool)
        -> Result<Self::Id, StorageError>;

    /// Returns the storage entity for `ty`, creating it (and the entities of
    /// nested types) on first use.
    fn require_entity(&mut self, ty: &RecordType) -> Result<Self::Entity, StorageError>;

    /// Returns the storage entity for `ty` without creating it.
    ///
    /// Fails with [`StorageError::UnknownEntity`] if it was never created.
    fn get_entity(&self, ty: &RecordType) -> Result<Self::Entity, StorageError>;
}
