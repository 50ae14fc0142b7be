//! In-memory implementation of [`DocumentDatabase`].
//!
//! [`InMemoryDatabase`] is a first-class backend for tests and for pipelines
//! whose results need not outlive the process. Collections keep documents in
//! insertion order, so "first match" is deterministic.

use indexmap::IndexMap;

use super::{Document, DocumentDatabase, Filter};
use crate::error::StorageError;
use crate::types::DocumentId;

/// Documents of one collection, in insertion order.
pub(crate) type StoredCollection = Vec<(DocumentId, Document)>;

/// In-memory document database.
#[derive(Debug, Clone)]
pub struct InMemoryDatabase {
    name: String,
    collections: IndexMap<String, StoredCollection>,
}

impl InMemoryDatabase {
    /// Creates an empty database called `name`.
    pub fn new(name: &str) -> Self {
        InMemoryDatabase {
            name: name.to_string(),
            collections: IndexMap::new(),
        }
    }

    /// Replaces the contents of a collection.
    pub(crate) fn load_collection(&mut self, name: &str, documents: StoredCollection) {
        self.collections.insert(name.to_string(), documents);
    }

    pub(crate) fn collection(&self, name: &str) -> Option<&StoredCollection> {
        self.collections.get(name)
    }
}

impl DocumentDatabase for InMemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn collection_names(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.collections.keys().cloned().collect())
    }

    fn create_collection(&mut self, name: &str) -> Result<(), StorageError> {
        self.collections.entry(name.to_string()).or_default();
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>, StorageError> {
        let Some(documents) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .take(limit)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn insert_one(
        &mut self,
        collection: &str,
        document: Document,
    ) -> Result<DocumentId, StorageError> {
        let id = DocumentId::generate();
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), document));
        Ok(id)
    }

    fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StorageError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| doc_id == id))
            .map(|(_, doc)| doc.clone()))
    }

    fn count(&self, collection: &str) -> Result<usize, StorageError> {
        Ok(self.collections.get(collection).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Condition, DocValue, Match};
    use super::*;

    fn doc(n: i64) -> Document {
        let mut doc = Document::new();
        doc.insert("n".into(), DocValue::Int(n));
        doc
    }

    fn eq(n: i64) -> Filter {
        Filter::new(vec![Condition {
            path: "n".into(),
            matcher: Match::Eq(DocValue::Int(n)),
        }])
    }

    #[test]
    fn test_insert_creates_collection() {
        let mut db = InMemoryDatabase::new("pipeline");
        assert!(db.collection_names().unwrap().is_empty());
        let id = db.insert_one("numbers", doc(1)).unwrap();
        assert_eq!(db.collection_names().unwrap(), vec!["numbers".to_string()]);
        assert_eq!(db.get("numbers", &id).unwrap(), Some(doc(1)));
        assert_eq!(db.count("numbers").unwrap(), 1);
    }

    #[test]
    fn test_find_respects_order_and_limit() {
        let mut db = InMemoryDatabase::new("pipeline");
        let first = db.insert_one("numbers", doc(1)).unwrap();
        let second = db.insert_one("numbers", doc(1)).unwrap();
        db.insert_one("numbers", doc(2)).unwrap();

        assert_eq!(db.find("numbers", &eq(1), 1).unwrap(), vec![first.clone()]);
        assert_eq!(db.find("numbers", &eq(1), 5).unwrap(), vec![first, second]);
        assert!(db.find("numbers", &eq(3), 5).unwrap().is_empty());
        assert!(db.find("missing", &eq(1), 5).unwrap().is_empty());
    }

    #[test]
    fn test_create_collection_is_idempotent() {
        let mut db = InMemoryDatabase::new("pipeline");
        db.insert_one("numbers", doc(1)).unwrap();
        db.create_collection("numbers").unwrap();
        assert_eq!(db.count("numbers").unwrap(), 1);
        assert_eq!(db.name(), "pipeline");
    }
}
