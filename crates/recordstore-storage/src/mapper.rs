//! Mapping of declared field types to backend storage types and values.
//!
//! Rules apply in priority order:
//! 1. nested record types become a foreign reference (relational) or an
//!    embedded sub-document (document store);
//! 2. enumerations store the member's symbolic name, constrained to the
//!    member set on relational backends;
//! 3. text key fields compare case-insensitively;
//! 4. everything else goes through a fixed scalar table.
//!
//! A type matching no rule fails with [`StorageError::UnsupportedType`].

use std::sync::Arc;

use chrono::NaiveTime;
use recordstore_core::{EnumType, FieldSpec, FieldType, Record, RecordType, Value};
use rusqlite::types::Value as SqlValue;

use crate::document::{DocValue, Document};
use crate::error::StorageError;

/// Text layout used for `DATETIME` columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Text layout used for `DATE` columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn unsupported(field: &FieldSpec) -> StorageError {
    StorageError::UnsupportedType {
        field: field.name().to_string(),
        ty: field.ty().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Relational
// ---------------------------------------------------------------------------

/// Column type of a scalar field on the relational backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Float,
    Varchar,
    /// Text compared with `NOCASE` collation.
    VarcharNoCase,
    Blob,
    DateTime,
    Date,
    Boolean,
    /// Member name, constrained to the member set.
    Enum(EnumType),
}

impl SqlType {
    /// Column type declaration, including any collation or check clause.
    pub fn declaration(&self, column: &str) -> String {
        match self {
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Varchar => "VARCHAR".to_string(),
            SqlType::VarcharNoCase => "VARCHAR COLLATE NOCASE".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Enum(def) => {
                let members: Vec<String> = def
                    .members()
                    .iter()
                    .map(|m| format!("'{}'", m.replace('\'', "''")))
                    .collect();
                format!(
                    "VARCHAR({}) CHECK ({} IN ({}))",
                    def.max_member_len(),
                    quote_ident(column),
                    members.join(", ")
                )
            }
        }
    }
}

/// What a field becomes on the relational backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlColumnKind {
    /// A scalar column named after the field.
    Scalar(SqlType),
    /// A `<field>_id` column referencing the nested type's table.
    Foreign(Arc<RecordType>),
}

/// Maps a field to its relational column kind.
pub fn sql_column(field: &FieldSpec) -> Result<SqlColumnKind, StorageError> {
    let sql_type = match field.ty() {
        FieldType::Record(nested) => return Ok(SqlColumnKind::Foreign(Arc::clone(nested))),
        FieldType::Enum(def) => SqlType::Enum(def.clone()),
        FieldType::Text if field.is_key() => SqlType::VarcharNoCase,
        FieldType::Integer => SqlType::Integer,
        FieldType::Float => SqlType::Float,
        FieldType::Text => SqlType::Varchar,
        FieldType::Binary => SqlType::Blob,
        FieldType::Timestamp => SqlType::DateTime,
        FieldType::Date => SqlType::Date,
        FieldType::Boolean => SqlType::Boolean,
        FieldType::List(_) | FieldType::Other(_) => return Err(unsupported(field)),
    };
    Ok(SqlColumnKind::Scalar(sql_type))
}

/// Name of the column holding a nested record's row id.
pub fn foreign_column(field: &FieldSpec) -> String {
    format!("{}_id", field.name())
}

/// Name of the column a field is stored in: the field name, or
/// `<field>_id` for nested record fields.
pub fn column_name(field: &FieldSpec) -> String {
    if field.ty().is_record() {
        foreign_column(field)
    } else {
        field.name().to_string()
    }
}

/// Checks that every field of `ty` and of its nested types maps to a
/// column, and that no two fields of one type share a column name.
pub fn check_relational(ty: &RecordType) -> Result<(), StorageError> {
    let mut columns: Vec<String> = Vec::with_capacity(ty.fields().len());
    for field in ty.fields() {
        if let SqlColumnKind::Foreign(nested) = sql_column(field)? {
            check_relational(&nested)?;
        }
        let column = column_name(field);
        if columns.contains(&column) {
            return Err(StorageError::ColumnCollision {
                record: ty.name().to_string(),
                column,
            });
        }
        columns.push(column);
    }
    Ok(())
}

fn non_finite(field: &FieldSpec, x: f64) -> StorageError {
    StorageError::InvalidValue {
        field: field.name().to_string(),
        reason: format!("non-finite float {}", x),
    }
}

/// Converts a scalar field value to its SQL representation.
///
/// Nested record values are not converted here: the writer substitutes the
/// nested record's row id.
pub fn sql_value(field: &FieldSpec, value: &Value) -> Result<SqlValue, StorageError> {
    let converted = match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        // SQLite stores NaN as NULL.
        Value::Float(x) if x.is_nan() => return Err(non_finite(field, *x)),
        Value::Float(x) => SqlValue::Real(*x),
        Value::Text(s) | Value::Enum(s) => SqlValue::Text(s.clone()),
        Value::Binary(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Record(_) | Value::List(_) => return Err(unsupported(field)),
    };
    Ok(converted)
}

/// Quotes an SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ---------------------------------------------------------------------------
// Document store
// ---------------------------------------------------------------------------

/// How a field is encoded inside a document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocEncoding {
    Int,
    Float,
    Text,
    /// Text compared under ASCII case folding.
    TextNoCase,
    Binary,
    DateTime,
    /// Date widened to a DateTime at midnight.
    DateAsDateTime,
    Bool,
    /// Enumeration member name.
    EnumName,
    /// Embedded sub-document with the nested type's own layout.
    Embedded(Vec<DocField>),
    Array(Box<DocEncoding>),
}

/// One field of a collection layout.
#[derive(Debug, Clone, PartialEq)]
pub struct DocField {
    pub name: String,
    pub encoding: DocEncoding,
}

/// Maps a field to its document encoding.
pub fn doc_encoding(field: &FieldSpec) -> Result<DocEncoding, StorageError> {
    encoding_of(field.ty(), field.is_key()).ok_or_else(|| unsupported(field))
}

fn encoding_of(ty: &FieldType, key: bool) -> Option<DocEncoding> {
    let encoding = match ty {
        FieldType::Record(nested) => DocEncoding::Embedded(doc_layout(nested).ok()?),
        FieldType::Enum(_) => DocEncoding::EnumName,
        FieldType::Text if key => DocEncoding::TextNoCase,
        FieldType::Integer => DocEncoding::Int,
        FieldType::Float => DocEncoding::Float,
        FieldType::Text => DocEncoding::Text,
        FieldType::Binary => DocEncoding::Binary,
        FieldType::Timestamp => DocEncoding::DateTime,
        FieldType::Date => DocEncoding::DateAsDateTime,
        FieldType::Boolean => DocEncoding::Bool,
        FieldType::List(inner) if !inner.is_record() => {
            DocEncoding::Array(Box::new(encoding_of(inner, false)?))
        }
        FieldType::List(_) | FieldType::Other(_) => return None,
    };
    Some(encoding)
}

/// Field layout of a collection, embedding nested types recursively.
///
/// Fails on the first field (at any depth) without an encoding.
pub fn doc_layout(ty: &RecordType) -> Result<Vec<DocField>, StorageError> {
    ty.fields()
        .iter()
        .map(|field| {
            Ok(DocField {
                name: field.name().to_string(),
                encoding: doc_encoding(field)?,
            })
        })
        .collect()
}

/// Converts a field value to its document representation.
///
/// Non-finite floats are rejected: JSON has no representation for them.
pub fn doc_value(field: &FieldSpec, value: &Value) -> Result<DocValue, StorageError> {
    let converted = match value {
        Value::Null => DocValue::Null,
        Value::Integer(i) => DocValue::Int(*i),
        Value::Float(x) if !x.is_finite() => return Err(non_finite(field, *x)),
        Value::Float(x) => DocValue::Float(*x),
        Value::Text(s) | Value::Enum(s) => DocValue::Text(s.clone()),
        Value::Binary(b) => DocValue::Binary(b.clone()),
        Value::Timestamp(ts) => DocValue::DateTime(*ts),
        Value::Date(d) => DocValue::DateTime(d.and_time(NaiveTime::MIN)),
        Value::Boolean(b) => DocValue::Bool(*b),
        Value::Record(record) => DocValue::Document(encode_document(record)?),
        Value::List(items) => DocValue::Array(
            items
                .iter()
                .map(|item| doc_value(field, item))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(converted)
}

/// Encodes every field of `record`, embedding nested records.
pub fn encode_document(record: &Record) -> Result<Document, StorageError> {
    let mut document = Document::new();
    for (field, value) in record.entries() {
        document.insert(field.name().to_string(), doc_value(field, value)?);
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use recordstore_core::FieldSpec;

    use super::*;

    fn fruit() -> EnumType {
        EnumType::new("Fruit", ["APPLE", "ORANGE"]).unwrap()
    }

    #[test]
    fn test_scalar_table() {
        let cases = [
            (FieldType::Integer, SqlType::Integer),
            (FieldType::Float, SqlType::Float),
            (FieldType::Text, SqlType::Varchar),
            (FieldType::Binary, SqlType::Blob),
            (FieldType::Timestamp, SqlType::DateTime),
            (FieldType::Date, SqlType::Date),
            (FieldType::Boolean, SqlType::Boolean),
        ];
        for (ty, expected) in cases {
            let field = FieldSpec::new("f", ty);
            assert_eq!(sql_column(&field).unwrap(), SqlColumnKind::Scalar(expected));
        }
    }

    #[test]
    fn test_text_key_is_case_insensitive() {
        let field = FieldSpec::new("name", FieldType::Text).key();
        assert_eq!(
            sql_column(&field).unwrap(),
            SqlColumnKind::Scalar(SqlType::VarcharNoCase)
        );
        assert_eq!(doc_encoding(&field).unwrap(), DocEncoding::TextNoCase);
    }

    #[test]
    fn test_enum_takes_priority_over_key_text() {
        let field = FieldSpec::new("fruit", FieldType::Enum(fruit())).key();
        let kind = sql_column(&field).unwrap();
        assert_eq!(kind, SqlColumnKind::Scalar(SqlType::Enum(fruit())));
        assert_eq!(
            SqlType::Enum(fruit()).declaration("fruit"),
            "VARCHAR(6) CHECK (\"fruit\" IN ('APPLE', 'ORANGE'))"
        );
    }

    #[test]
    fn test_unsupported_types() {
        let list = FieldSpec::new("tags", FieldType::List(Box::new(FieldType::Text)));
        assert!(matches!(
            sql_column(&list),
            Err(StorageError::UnsupportedType { .. })
        ));
        // Documents hold lists natively.
        assert_eq!(
            doc_encoding(&list).unwrap(),
            DocEncoding::Array(Box::new(DocEncoding::Text))
        );

        let other = FieldSpec::new("price", FieldType::Other("Decimal".into()));
        assert!(sql_column(&other).is_err());
        assert!(doc_encoding(&other).is_err());
    }

    #[test]
    fn test_check_relational_walks_nested_types() {
        let sub = RecordType::builder("SubData")
            .key("integer", FieldType::Integer)
            .field("blob", FieldType::Other("Pickle".into()))
            .build()
            .unwrap();
        let parent = RecordType::builder("Parent")
            .key("sub", FieldType::Record(sub))
            .build()
            .unwrap();
        let err = check_relational(&parent).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType { ref field, .. } if field == "blob"));
        assert!(doc_layout(&parent).is_err());
    }

    #[test]
    fn test_sql_values() {
        let field = FieldSpec::new("f", FieldType::Timestamp);
        let ts = NaiveDate::from_ymd_opt(2019, 6, 16)
            .unwrap()
            .and_hms_opt(12, 34, 56)
            .unwrap();
        assert_eq!(
            sql_value(&field, &Value::Timestamp(ts)).unwrap(),
            SqlValue::Text("2019-06-16 12:34:56.000000".into())
        );
        let date = NaiveDate::from_ymd_opt(2019, 6, 16).unwrap();
        assert_eq!(
            sql_value(&field, &Value::Date(date)).unwrap(),
            SqlValue::Text("2019-06-16".into())
        );
        assert_eq!(
            sql_value(&field, &Value::Boolean(true)).unwrap(),
            SqlValue::Integer(1)
        );
    }

    #[test]
    fn test_check_relational_rejects_column_collisions() {
        let sub = RecordType::builder("SubData")
            .key("integer", FieldType::Integer)
            .build()
            .unwrap();
        let clash = RecordType::builder("Clash")
            .key("sub", FieldType::Record(sub.clone()))
            .field("sub_id", FieldType::Integer)
            .build()
            .unwrap();
        let err = check_relational(&clash).unwrap_err();
        assert!(matches!(err, StorageError::ColumnCollision { ref column, .. } if column == "sub_id"));

        // A field named like the generated key is fine: the key is renamed.
        let tree = RecordType::builder("Tree")
            .key("id", FieldType::Integer)
            .key("taxonomy", FieldType::Record(sub))
            .build()
            .unwrap();
        assert!(check_relational(&tree).is_ok());
    }

    #[test]
    fn test_non_finite_floats_are_rejected() {
        let field = FieldSpec::new("value", FieldType::Float);
        for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                doc_value(&field, &Value::Float(x)),
                Err(StorageError::InvalidValue { .. })
            ));
        }
        let list = FieldSpec::new("values", FieldType::List(Box::new(FieldType::Float)));
        assert!(doc_value(&list, &Value::List(vec![Value::Float(1.0), Value::Float(f64::NAN)])).is_err());

        assert!(sql_value(&field, &Value::Float(f64::NAN)).is_err());
        assert_eq!(
            sql_value(&field, &Value::Float(f64::INFINITY)).unwrap(),
            SqlValue::Real(f64::INFINITY)
        );
    }

    #[test]
    fn test_doc_values_normalize_dates_and_enums() {
        let field = FieldSpec::new("f", FieldType::Date);
        let date = NaiveDate::from_ymd_opt(2019, 8, 1).unwrap();
        assert_eq!(
            doc_value(&field, &Value::Date(date)).unwrap(),
            DocValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );
        let field = FieldSpec::new("fruit", FieldType::Enum(fruit()));
        assert_eq!(
            doc_value(&field, &Value::Enum("APPLE".into())).unwrap(),
            DocValue::Text("APPLE".into())
        );
    }

    #[test]
    fn test_encode_document_embeds_nested_records() {
        let sub = RecordType::builder("SubData")
            .key("integer", FieldType::Integer)
            .build()
            .unwrap();
        let parent = RecordType::builder("Parent")
            .key("id", FieldType::Integer)
            .field("sub", FieldType::Record(sub.clone()))
            .build()
            .unwrap();
        let record = Record::builder(&parent)
            .set("id", 1)
            .set("sub", Record::builder(&sub).set("integer", 5).build().unwrap())
            .build()
            .unwrap();

        let document = encode_document(&record).unwrap();
        let mut embedded = Document::new();
        embedded.insert("integer".into(), DocValue::Int(5));
        assert_eq!(document.get("sub"), Some(&DocValue::Document(embedded)));
    }
}
