//! Declared semantic types of record fields.
//!
//! [`FieldType`] covers the scalar kinds every backend stores natively,
//! enumerations, nested record types, and two kinds that only some (or no)
//! backends can map: homogeneous lists and caller-declared opaque types.

use std::fmt;
use std::sync::Arc;

use crate::error::CoreError;
use crate::record_type::RecordType;
use crate::value::Value;

/// The declared type of a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Float,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Binary,
    /// Naive date and time, microsecond precision.
    Timestamp,
    /// Naive calendar date.
    Date,
    /// Boolean.
    Boolean,
    /// Enumeration with a closed set of symbolic members.
    Enum(EnumType),
    /// Another record type, nested as a foreign relation.
    Record(Arc<RecordType>),
    /// Homogeneous list of another field type.
    List(Box<FieldType>),
    /// A caller-declared type with no storage mapping.
    Other(String),
}

impl FieldType {
    /// Returns the nested record type, if this is a record field type.
    pub fn as_record(&self) -> Option<&Arc<RecordType>> {
        match self {
            FieldType::Record(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns `true` if this is a nested record type.
    pub fn is_record(&self) -> bool {
        matches!(self, FieldType::Record(_))
    }

    /// Returns `true` if `value` is compatible with this declared type.
    ///
    /// `Value::Null` is accepted by every type; whether null is permitted
    /// for a particular field is decided by its declared default.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::Integer, Value::Integer(_)) => true,
            (FieldType::Float, Value::Float(_)) => true,
            (FieldType::Text, Value::Text(_)) => true,
            (FieldType::Binary, Value::Binary(_)) => true,
            (FieldType::Timestamp, Value::Timestamp(_)) => true,
            (FieldType::Date, Value::Date(_)) => true,
            (FieldType::Boolean, Value::Boolean(_)) => true,
            (FieldType::Enum(def), Value::Enum(member)) => def.contains(member),
            (FieldType::Record(ty), Value::Record(record)) => record.record_type() == ty,
            (FieldType::List(inner), Value::List(items)) => items.iter().all(|v| inner.accepts(v)),
            // Opaque types carry arbitrary caller values; nothing to check.
            (FieldType::Other(_), _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Integer => write!(f, "integer"),
            FieldType::Float => write!(f, "float"),
            FieldType::Text => write!(f, "text"),
            FieldType::Binary => write!(f, "binary"),
            FieldType::Timestamp => write!(f, "timestamp"),
            FieldType::Date => write!(f, "date"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Enum(def) => write!(f, "enum {}", def.name()),
            FieldType::Record(ty) => write!(f, "record {}", ty.name()),
            FieldType::List(inner) => write!(f, "list of {}", inner),
            FieldType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Enumeration definition: a name and its ordered, unique member names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    name: String,
    members: Vec<String>,
}

impl EnumType {
    /// Creates an enumeration.
    ///
    /// Returns [`CoreError::InvalidEnum`] if there are no members or a member
    /// name repeats.
    pub fn new<I, S>(name: &str, members: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Err(CoreError::InvalidEnum {
                name: name.to_string(),
                reason: "no members".to_string(),
            });
        }
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(CoreError::InvalidEnum {
                    name: name.to_string(),
                    reason: format!("duplicate member '{}'", member),
                });
            }
        }
        Ok(EnumType {
            name: name.to_string(),
            members,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Returns `true` if `member` names one of this enumeration's members.
    pub fn contains(&self, member: &str) -> bool {
        self.members.iter().any(|m| m == member)
    }

    /// Length in bytes of the longest member name.
    pub fn max_member_len(&self) -> usize {
        self.members.iter().map(String::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fruit() -> EnumType {
        EnumType::new("Fruit", ["APPLE", "ORANGE"]).unwrap()
    }

    #[test]
    fn test_enum_rejects_duplicates_and_empty() {
        assert!(matches!(
            EnumType::new("Fruit", ["APPLE", "APPLE"]),
            Err(CoreError::InvalidEnum { .. })
        ));
        assert!(matches!(
            EnumType::new("Fruit", Vec::<String>::new()),
            Err(CoreError::InvalidEnum { .. })
        ));
    }

    #[test]
    fn test_enum_member_lookup() {
        let fruit = fruit();
        assert!(fruit.contains("ORANGE"));
        assert!(!fruit.contains("orange"));
        assert_eq!(fruit.max_member_len(), 6);
    }

    #[test]
    fn test_accepts_scalars() {
        assert!(FieldType::Integer.accepts(&Value::Integer(1)));
        assert!(!FieldType::Integer.accepts(&Value::Float(1.0)));
        assert!(FieldType::Text.accepts(&Value::Null));
        assert!(FieldType::Enum(fruit()).accepts(&Value::Enum("APPLE".into())));
        assert!(!FieldType::Enum(fruit()).accepts(&Value::Enum("PEAR".into())));
    }

    #[test]
    fn test_accepts_lists() {
        let ty = FieldType::List(Box::new(FieldType::Integer));
        assert!(ty.accepts(&Value::List(vec![Value::Integer(1), Value::Integer(2)])));
        assert!(!ty.accepts(&Value::List(vec![Value::Text("x".into())])));
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldType::Timestamp.to_string(), "timestamp");
        assert_eq!(FieldType::Enum(fruit()).to_string(), "enum Fruit");
        assert_eq!(
            FieldType::List(Box::new(FieldType::Text)).to_string(),
            "list of text"
        );
        assert_eq!(FieldType::Other("Decimal".into()).to_string(), "Decimal");
    }
}
