//! [`RecordStore`] that stores nothing.
//!
//! Used when a pipeline runs without persistence: every record reports as
//! not existing and every add succeeds without side effects.

use recordstore_core::{Record, RecordType};

use crate::error::StorageError;
use crate::traits::RecordStore;

/// Backend that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStore;

impl NoopStore {
    pub fn new() -> Self {
        NoopStore
    }
}

impl RecordStore for NoopStore {
    type Id = ();
    type Entity = ();

    fn resolve(&mut self, _record: &Record) -> Result<Option<()>, StorageError> {
        Ok(None)
    }

    fn add_with(&mut self, record: &Record, _check_exists: bool) -> Result<(), StorageError> {
        tracing::trace!(record = record.record_type().name(), "discarded record");
        Ok(())
    }

    fn require_entity(&mut self, _ty: &RecordType) -> Result<(), StorageError> {
        Ok(())
    }

    fn get_entity(&self, _ty: &RecordType) -> Result<(), StorageError> {
        Ok(())
    }
}
