//! Document-store implementation of [`RecordStore`].
//!
//! [`DocumentStore`] maps each record type to one collection. Nested records
//! are embedded as sub-documents holding all of their fields, so only the
//! top-level type gets a collection of its own. Identity lookups address
//! embedded key fields by dotted path.

use std::collections::HashMap;

use recordstore_core::{FieldSpec, Record, RecordType, Value};

use super::{Condition, DocValue, DocumentDatabase, Filter, Match};
use crate::error::StorageError;
use crate::identity::IdentityMap;
use crate::mapper::{self, DocEncoding, DocField};
use crate::resolve::{key_predicates, KeyPredicates};
use crate::traits::RecordStore;
use crate::types::DocumentId;

/// Adapter-side description of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub name: String,
    /// Field layout, empty for collections discovered at construction and
    /// not yet required by a record type.
    pub fields: Vec<DocField>,
}

/// Document-store-backed implementation of [`RecordStore`].
pub struct DocumentStore<D> {
    db: D,
    collections: HashMap<String, Collection>,
    ids: IdentityMap<DocumentId>,
}

impl<D: DocumentDatabase> DocumentStore<D> {
    /// Wraps a database handle, discovering the collections it already holds.
    pub fn new(db: D) -> Result<Self, StorageError> {
        let collections = db
            .collection_names()?
            .into_iter()
            .map(|name| {
                let collection = Collection {
                    name: name.clone(),
                    fields: Vec::new(),
                };
                (name, collection)
            })
            .collect::<HashMap<_, _>>();
        tracing::debug!(
            database = db.name(),
            collections = collections.len(),
            "opened document store"
        );
        Ok(DocumentStore {
            db,
            collections,
            ids: IdentityMap::new(),
        })
    }

    /// The underlying database handle.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Drops the memoized document id of `record`, if any.
    pub fn forget(&mut self, record: &Record) -> Option<DocumentId> {
        self.ids.forget(record.handle())
    }

    /// Drops every memoized document id.
    pub fn clear_memo(&mut self) {
        self.ids.clear();
    }

    /// Names of all known collections, sorted.
    pub fn collection_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.collections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Filter conditions on the fields under `prefix` (empty at top level).
struct DocPredicates {
    prefix: String,
}

impl DocPredicates {
    fn path(&self, field: &FieldSpec) -> String {
        format!("{}{}", self.prefix, field.name())
    }
}

impl KeyPredicates for DocPredicates {
    type Predicate = Condition;

    fn scalar(&mut self, field: &FieldSpec, value: &Value) -> Result<Condition, StorageError> {
        let matcher = match (mapper::doc_encoding(field)?, value) {
            (DocEncoding::TextNoCase, Value::Text(text)) => Match::EqIgnoreCase(text.clone()),
            _ => Match::Eq(mapper::doc_value(field, value)?),
        };
        Ok(Condition {
            path: self.path(field),
            matcher,
        })
    }

    fn nested(
        &mut self,
        field: &FieldSpec,
        record: &Record,
    ) -> Result<Option<Vec<Condition>>, StorageError> {
        let mut embedded = DocPredicates {
            prefix: format!("{}.", self.path(field)),
        };
        key_predicates(&mut embedded, record)
    }

    fn nested_null(&mut self, field: &FieldSpec) -> Result<Condition, StorageError> {
        Ok(Condition {
            path: self.path(field),
            matcher: Match::Eq(DocValue::Null),
        })
    }
}

impl<D: DocumentDatabase> RecordStore for DocumentStore<D> {
    type Id = DocumentId;
    type Entity = Collection;

    fn resolve(&mut self, record: &Record) -> Result<Option<DocumentId>, StorageError> {
        if let Some(id) = self.ids.get(record.handle()) {
            return Ok(Some(id));
        }

        let collection = record.record_type().entity_name();
        if !self.collections.contains_key(&collection) {
            return Ok(None);
        }

        let mut top = DocPredicates {
            prefix: String::new(),
        };
        let Some(conditions) = key_predicates(&mut top, record)? else {
            return Ok(None);
        };
        let filter = Filter::new(conditions);
        tracing::debug!(collection = %collection, %filter, "find filter");

        let found = self.db.find(&collection, &filter, 2)?;
        if found.len() > 1 {
            tracing::warn!(
                collection = %collection,
                "key fields match more than one document; using the first inserted"
            );
        }
        let Some(id) = found.into_iter().next() else {
            return Ok(None);
        };

        self.ids.remember(record.handle(), id.clone());
        Ok(Some(id))
    }

    fn add_with(
        &mut self,
        record: &Record,
        check_exists: bool,
    ) -> Result<DocumentId, StorageError> {
        if let Some(id) = self.ids.get(record.handle()) {
            tracing::debug!(record = %record.handle(), %id, "memoized document id");
            return Ok(id);
        }

        if check_exists {
            if let Some(id) = self.resolve(record)? {
                return Ok(id);
            }
        }

        let collection = self.require_entity(record.record_type())?.name;
        let document = mapper::encode_document(record)?;
        let id = self.db.insert_one(&collection, document)?;
        tracing::debug!(collection = %collection, %id, "added document");

        self.ids.remember(record.handle(), id.clone());
        Ok(id)
    }

    fn require_entity(&mut self, ty: &RecordType) -> Result<Collection, StorageError> {
        let name = ty.entity_name();
        if let Some(collection) = self.collections.get(&name) {
            if !collection.fields.is_empty() || ty.fields().is_empty() {
                return Ok(collection.clone());
            }
        }

        let fields = mapper::doc_layout(ty)?;
        if !self.collections.contains_key(&name) {
            self.db.create_collection(&name)?;
            tracing::debug!(collection = %name, "created collection");
        }
        let collection = Collection { name, fields };
        self.collections
            .insert(collection.name.clone(), collection.clone());
        Ok(collection)
    }

    fn get_entity(&self, ty: &RecordType) -> Result<Collection, StorageError> {
        let name = ty.entity_name();
        self.collections
            .get(&name)
            .cloned()
            .ok_or(StorageError::UnknownEntity(name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use recordstore_core::{EnumType, FieldType};

    use super::super::{Document, InMemoryDatabase};
    use super::*;

    fn store() -> DocumentStore<InMemoryDatabase> {
        DocumentStore::new(InMemoryDatabase::new("test")).unwrap()
    }

    fn arithmetic_type() -> Arc<RecordType> {
        RecordType::builder("ArithmeticData")
            .key("a", FieldType::Integer)
            .key("b", FieldType::Integer)
            .field("result", FieldType::Integer)
            .build()
            .unwrap()
    }

    fn arithmetic(ty: &Arc<RecordType>, a: i64, b: i64, result: i64) -> Record {
        Record::builder(ty)
            .set("a", a)
            .set("b", b)
            .set("result", result)
            .build()
            .unwrap()
    }

    fn taxonomy_type() -> Arc<RecordType> {
        RecordType::builder("Taxonomy")
            .key("genus", FieldType::Text)
            .field("family", FieldType::Text)
            .build()
            .unwrap()
    }

    fn tree_type(taxonomy: &Arc<RecordType>) -> Arc<RecordType> {
        RecordType::builder("Tree")
            .key("id", FieldType::Integer)
            .key("taxonomy", FieldType::Record(taxonomy.clone()))
            .field("name", FieldType::Text)
            .build()
            .unwrap()
    }

    fn tree(tree_ty: &Arc<RecordType>, taxonomy_ty: &Arc<RecordType>, genus: &str) -> Record {
        let taxonomy = Record::builder(taxonomy_ty)
            .set("genus", genus)
            .set("family", "malvaceae")
            .build()
            .unwrap();
        Record::builder(tree_ty)
            .set("id", 1)
            .set("taxonomy", taxonomy)
            .set("name", "rose of sharon")
            .build()
            .unwrap()
    }

    #[test]
    fn test_arithmetic_scenario() {
        let mut store = store();
        let ty = arithmetic_type();
        let stored = arithmetic(&ty, 3, 4, -1);
        assert!(!store.exists(&stored).unwrap());
        store.add(&stored).unwrap();

        assert!(store.exists(&arithmetic(&ty, 3, 4, -1)).unwrap());
        // Non-key fields do not take part in identity.
        assert!(store.exists(&arithmetic(&ty, 3, 4, 0)).unwrap());
        assert!(!store.exists(&arithmetic(&ty, 3, 99, 102)).unwrap());
    }

    #[test]
    fn test_cross_instance_dedup() {
        let mut store = store();
        let ty = arithmetic_type();
        let first = store.add(&arithmetic(&ty, 1, 2, 3)).unwrap();
        let second = store.add(&arithmetic(&ty, 1, 2, 3)).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.database().count("arithmetic_data").unwrap(), 1);

        let third = store.add_with(&arithmetic(&ty, 1, 2, 3), false).unwrap();
        assert_ne!(first, third);
        assert_eq!(store.database().count("arithmetic_data").unwrap(), 2);
    }

    #[test]
    fn test_same_instance_is_memoized() {
        let mut store = store();
        let ty = arithmetic_type();
        let record = arithmetic(&ty, 5, 6, 11);
        let id = store.add_with(&record, false).unwrap();
        assert_eq!(store.add_with(&record, false).unwrap(), id);
        assert_eq!(store.database().count("arithmetic_data").unwrap(), 1);
    }

    #[test]
    fn test_forgotten_instance_is_resolved_again() {
        let mut store = store();
        let ty = arithmetic_type();
        let record = arithmetic(&ty, 5, 6, 11);
        let id = store.add(&record).unwrap();

        assert_eq!(store.forget(&record), Some(id.clone()));
        assert_eq!(store.add(&record).unwrap(), id);
        store.clear_memo();
        assert_ne!(store.add_with(&record, false).unwrap(), id);
        assert_eq!(store.database().count("arithmetic_data").unwrap(), 2);
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let mut store = store();
        let ty = RecordType::builder("Reading")
            .key("sensor", FieldType::Integer)
            .field("value", FieldType::Float)
            .build()
            .unwrap();
        let reading = |value: f64| {
            Record::builder(&ty)
                .set("sensor", 1)
                .set("value", value)
                .build()
                .unwrap()
        };

        for value in [f64::NAN, f64::INFINITY] {
            assert!(matches!(
                store.add(&reading(value)),
                Err(StorageError::InvalidValue { .. })
            ));
        }
        assert_eq!(store.database().count("reading").unwrap(), 0);
        store.add(&reading(0.5)).unwrap();
        assert_eq!(store.database().count("reading").unwrap(), 1);
    }

    #[test]
    fn test_nested_records_are_embedded() {
        let mut store = store();
        let taxonomy = taxonomy_type();
        let tree_ty = tree_type(&taxonomy);
        let id = store.add(&tree(&tree_ty, &taxonomy, "hibiscus")).unwrap();

        assert_eq!(store.collection_names(), vec!["tree"]);
        let document = store.database().get("tree", &id).unwrap().unwrap();
        let mut embedded = Document::new();
        embedded.insert("genus".into(), DocValue::Text("hibiscus".into()));
        embedded.insert("family".into(), DocValue::Text("malvaceae".into()));
        assert_eq!(document.get("taxonomy"), Some(&DocValue::Document(embedded)));
    }

    #[test]
    fn test_embedded_key_matches_by_path_ignoring_case() {
        let mut store = store();
        let taxonomy = taxonomy_type();
        let tree_ty = tree_type(&taxonomy);
        let id = store.add(&tree(&tree_ty, &taxonomy, "hibiscus")).unwrap();

        assert_eq!(
            store.resolve(&tree(&tree_ty, &taxonomy, "HIBISCUS")).unwrap(),
            Some(id)
        );
        assert_eq!(
            store.resolve(&tree(&tree_ty, &taxonomy, "acer")).unwrap(),
            None
        );
    }

    #[test]
    fn test_nested_type_without_keys_is_unresolvable() {
        let note = RecordType::builder("Note")
            .field("text", FieldType::Text)
            .build()
            .unwrap();
        let ty = RecordType::builder("Annotated")
            .key("id", FieldType::Integer)
            .key("note", FieldType::Record(note.clone()))
            .build()
            .unwrap();
        let record = || {
            Record::builder(&ty)
                .set("id", 1)
                .set("note", Record::builder(&note).set("text", "x").build().unwrap())
                .build()
                .unwrap()
        };

        let mut store = store();
        store.add(&record()).unwrap();
        assert!(!store.exists(&record()).unwrap());
    }

    #[test]
    fn test_dates_and_enums_are_normalized() {
        let fruit = EnumType::new("Fruit", ["APPLE", "ORANGE"]).unwrap();
        let ty = RecordType::builder("Harvest")
            .key("day", FieldType::Date)
            .key("fruit", FieldType::Enum(fruit))
            .build()
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2019, 8, 1).unwrap();
        let record = || {
            Record::builder(&ty)
                .set("day", day)
                .set("fruit", Value::Enum("APPLE".into()))
                .build()
                .unwrap()
        };

        let mut store = store();
        let id = store.add(&record()).unwrap();
        let document = store.database().get("harvest", &id).unwrap().unwrap();
        assert_eq!(
            document.get("day"),
            Some(&DocValue::DateTime(day.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert_eq!(document.get("fruit"), Some(&DocValue::Text("APPLE".into())));
        assert_eq!(store.resolve(&record()).unwrap(), Some(id));
    }

    #[test]
    fn test_unsupported_type_creates_no_collection() {
        let ty = RecordType::builder("Priced")
            .key("sku", FieldType::Text)
            .optional("price", FieldType::Other("Decimal".into()))
            .build()
            .unwrap();
        let record = Record::builder(&ty).set("sku", "a-1").build().unwrap();

        let mut store = store();
        let err = store.add(&record).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType { .. }));
        assert!(store.collection_names().is_empty());
        assert!(matches!(
            store.get_entity(&ty),
            Err(StorageError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_discovered_collections_gain_layout() {
        let mut db = InMemoryDatabase::new("test");
        db.create_collection("arithmetic_data").unwrap();
        let mut store = DocumentStore::new(db).unwrap();
        let ty = arithmetic_type();

        assert!(store.get_entity(&ty).unwrap().fields.is_empty());
        let collection = store.require_entity(&ty).unwrap();
        let names: Vec<&str> = collection.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "result"]);
    }
}
