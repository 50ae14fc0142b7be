//! Record instances.
//!
//! A [`Record`] is a concrete value of a [`RecordType`]. Every record built
//! through [`RecordBuilder`] receives a fresh [`RecordHandle`] that stands in
//! for object identity: storage adapters key their memoized identifiers on
//! it. Cloning a record keeps its handle, so a clone is the same instance as
//! far as memoization is concerned. Two separately built records with equal
//! values have different handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::record_type::{FieldSpec, RecordType};
use crate::value::Value;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a record instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle(u64);

impl RecordHandle {
    fn next() -> Self {
        RecordHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A concrete value of a record type.
#[derive(Debug, Clone)]
pub struct Record {
    ty: Arc<RecordType>,
    /// Values in field declaration order, one per declared field.
    values: IndexMap<String, Value>,
    handle: RecordHandle,
}

impl Record {
    /// Starts building an instance of `ty`.
    pub fn builder(ty: &Arc<RecordType>) -> RecordBuilder {
        RecordBuilder {
            ty: Arc::clone(ty),
            values: IndexMap::new(),
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn handle(&self) -> RecordHandle {
        self.handle
    }

    /// The value of field `name`, if the type declares it.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Every declared field paired with its value, in declaration order.
    pub fn entries(&self) -> impl Iterator<Item = (&FieldSpec, &Value)> {
        self.ty.fields().iter().map(move |spec| (spec, &self.values[spec.name()]))
    }

    /// Key fields paired with their values, in declaration order.
    pub fn key_entries(&self) -> impl Iterator<Item = (&FieldSpec, &Value)> {
        self.entries().filter(|(spec, _)| spec.is_key())
    }
}

/// Records compare by type and field values; handles are ignored.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.values == other.values
    }
}

/// Builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    ty: Arc<RecordType>,
    values: IndexMap<String, Value>,
}

impl RecordBuilder {
    /// Sets field `name`. Later calls overwrite earlier ones.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Validates the values against the record type and assigns a fresh
    /// handle.
    ///
    /// Unset fields take their declared default. Fails on unknown fields,
    /// unset fields without a default, values of the wrong kind, and null
    /// in a field that is not nullable.
    pub fn build(mut self) -> Result<Record, CoreError> {
        if let Some(unknown) = self.values.keys().find(|k| self.ty.field(k).is_none()) {
            return Err(CoreError::UnknownField {
                record: self.ty.name().to_string(),
                field: unknown.clone(),
            });
        }

        let mut values = IndexMap::with_capacity(self.ty.fields().len());
        for spec in self.ty.fields() {
            let value = match self.values.swap_remove(spec.name()) {
                Some(value) => value,
                None => match spec.default() {
                    Some(default) => default.clone(),
                    None => {
                        return Err(CoreError::MissingField {
                            record: self.ty.name().to_string(),
                            field: spec.name().to_string(),
                        })
                    }
                },
            };

            let fits = if value.is_null() {
                spec.is_nullable()
            } else {
                spec.ty().accepts(&value)
            };
            if !fits {
                return Err(CoreError::TypeMismatch {
                    record: self.ty.name().to_string(),
                    field: spec.name().to_string(),
                    expected: spec.ty().to_string(),
                    actual: value.kind().to_string(),
                });
            }
            values.insert(spec.name().to_string(), value);
        }

        Ok(Record {
            ty: self.ty,
            values,
            handle: RecordHandle::next(),
        })
    }
}
