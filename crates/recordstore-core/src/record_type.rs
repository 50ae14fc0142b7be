//! Record types and their field introspection.
//!
//! A [`RecordType`] is a named, ordered set of [`FieldSpec`]s. It is the
//! explicit-registration form of field introspection: storage code never
//! inspects caller structs, it walks `fields()`, `key_fields()` and
//! `nested_fields()` instead.
//!
//! Record types are immutable once built and reference nested types through
//! `Arc`, so a type can only nest types that were built before it. Cyclic
//! type graphs therefore cannot be constructed.

use std::sync::Arc;

use crate::error::CoreError;
use crate::naming::entity_name;
use crate::types::FieldType;
use crate::value::Value;

/// Declaration of one field of a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: String,
    ty: FieldType,
    key: bool,
    default: Option<Value>,
}

impl FieldSpec {
    /// A required, non-key field.
    pub fn new(name: &str, ty: FieldType) -> Self {
        FieldSpec {
            name: name.to_string(),
            ty,
            key: false,
            default: None,
        }
    }

    /// Marks the field as a key field.
    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    /// Declares a default used when a record leaves the field unset.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_key(&self) -> bool {
        self.key
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// A field is nullable iff its declared default is null.
    pub fn is_nullable(&self) -> bool {
        matches!(self.default, Some(Value::Null))
    }

    /// The nested record type, if this field holds a record.
    pub fn nested_type(&self) -> Option<&Arc<RecordType>> {
        self.ty.as_record()
    }
}

/// A named, ordered set of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldSpec>,
}

impl RecordType {
    /// Starts building a record type named `name`.
    pub fn builder(name: &str) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    /// The record type name as declared (identifier style).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical storage entity name, see [`entity_name`].
    pub fn entity_name(&self) -> String {
        entity_name(&self.name)
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Key fields in declaration order.
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.key)
    }

    /// Fields whose declared type is a nested record type.
    pub fn nested_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.ty.is_record())
    }

    pub fn has_key_fields(&self) -> bool {
        self.fields.iter().any(|f| f.key)
    }
}

/// Builder for [`RecordType`].
#[derive(Debug)]
pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldSpec>,
}

impl RecordTypeBuilder {
    /// Adds a required key field.
    pub fn key(self, name: &str, ty: FieldType) -> Self {
        self.push(FieldSpec::new(name, ty).key())
    }

    /// Adds a required non-key field.
    pub fn field(self, name: &str, ty: FieldType) -> Self {
        self.push(FieldSpec::new(name, ty))
    }

    /// Adds a nullable non-key field defaulting to null.
    pub fn optional(self, name: &str, ty: FieldType) -> Self {
        self.push(FieldSpec::new(name, ty).with_default(Value::Null))
    }

    /// Adds an arbitrary field specification.
    pub fn push(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Validates and freezes the record type.
    ///
    /// Returns [`CoreError::DuplicateField`] on a repeated field name and
    /// [`CoreError::TypeMismatch`] if a declared default does not fit its
    /// field type.
    pub fn build(self) -> Result<Arc<RecordType>, CoreError> {
        for (i, spec) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == spec.name) {
                return Err(CoreError::DuplicateField {
                    record: self.name.clone(),
                    field: spec.name.clone(),
                });
            }
            if let Some(default) = &spec.default {
                if !spec.ty.accepts(default) {
                    return Err(CoreError::TypeMismatch {
                        record: self.name.clone(),
                        field: spec.name.clone(),
                        expected: spec.ty.to_string(),
                        actual: default.kind().to_string(),
                    });
                }
            }
        }
        Ok(Arc::new(RecordType {
            name: self.name,
            fields: self.fields,
        }))
    }
}
