//! Record model for recordstore.
//!
//! A record is a typed, ordered collection of named fields. Some fields are
//! marked as key fields: together they define the logical identity of a
//! record. Fields may nest other record types, forming a tree.
//!
//! # Modules
//!
//! - [`types`]: FieldType and EnumType, the declared semantic field types
//! - [`record_type`]: FieldSpec and RecordType (field introspection)
//! - [`value`]: Value, the runtime value of a field
//! - [`record`]: Record instances and their stable RecordHandle
//! - [`naming`]: storage entity names derived from record type names
//! - [`error`]: CoreError

pub mod error;
pub mod naming;
pub mod record;
pub mod record_type;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use error::CoreError;
pub use naming::entity_name;
pub use record::{Record, RecordBuilder, RecordHandle};
pub use record_type::{FieldSpec, RecordType, RecordTypeBuilder};
pub use types::{EnumType, FieldType};
pub use value::Value;
