//! File-backed implementation of [`DocumentDatabase`].
//!
//! [`JsonFileDatabase`] keeps one JSON file per collection under
//! `<root>/<database>/`. All collections are loaded at open; every write
//! rewrites the affected collection file through a temporary file and a
//! rename, so a crash never leaves a half-written collection behind. The
//! in-memory copy only changes once its file has been written.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::memory::{InMemoryDatabase, StoredCollection};
use super::{DocValue, Document, DocumentDatabase, Filter};
use crate::error::StorageError;
use crate::types::DocumentId;

const EXTENSION: &str = "json";

#[derive(Serialize, Deserialize)]
struct StoredDocument {
    id: DocumentId,
    document: Document,
}

/// Durable document database stored as JSON files.
#[derive(Debug)]
pub struct JsonFileDatabase {
    dir: PathBuf,
    inner: InMemoryDatabase,
}

impl JsonFileDatabase {
    /// Opens (or creates) database `name` under directory `root`.
    pub fn open(root: impl AsRef<Path>, name: &str) -> Result<Self, StorageError> {
        let dir = root.as_ref().join(name);
        fs::create_dir_all(&dir)?;

        let mut inner = InMemoryDatabase::new(name);
        let mut entries: Vec<PathBuf> = fs::read_dir(&dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        entries.sort();

        for path in entries {
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(collection) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let stored: Vec<StoredDocument> = serde_json::from_slice(&fs::read(&path)?)?;
            tracing::debug!(collection, documents = stored.len(), "loaded collection");
            inner.load_collection(
                collection,
                stored.into_iter().map(|s| (s.id, s.document)).collect(),
            );
        }

        Ok(JsonFileDatabase { dir, inner })
    }

    /// Directory holding this database's collection files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write(&self, collection: &str, documents: &StoredCollection) -> Result<(), StorageError> {
        let stored: Vec<StoredDocument> = documents
            .iter()
            .map(|(id, document)| StoredDocument {
                id: id.clone(),
                document: document.clone(),
            })
            .collect();

        let path = self.dir.join(format!("{}.{}", collection, EXTENSION));
        let tmp = self.dir.join(format!(".{}.{}.tmp", collection, EXTENSION));
        fs::write(&tmp, serde_json::to_vec(&stored)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// JSON has no representation for NaN or infinities; serde_json would write
/// them as `null` and fail to read the collection back.
fn check_finite(document: &Document) -> Result<(), StorageError> {
    fn check(path: &str, value: &DocValue) -> Result<(), StorageError> {
        match value {
            DocValue::Float(x) if !x.is_finite() => Err(StorageError::InvalidValue {
                field: path.to_string(),
                reason: format!("non-finite float {}", x),
            }),
            DocValue::Array(items) => items.iter().try_for_each(|item| check(path, item)),
            DocValue::Document(inner) => inner
                .iter()
                .try_for_each(|(key, item)| check(&format!("{}.{}", path, key), item)),
            _ => Ok(()),
        }
    }
    document.iter().try_for_each(|(key, value)| check(key, value))
}

impl DocumentDatabase for JsonFileDatabase {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn collection_names(&self) -> Result<Vec<String>, StorageError> {
        self.inner.collection_names()
    }

    fn create_collection(&mut self, name: &str) -> Result<(), StorageError> {
        if self.inner.collection(name).is_none() {
            self.write(name, &StoredCollection::new())?;
            self.inner.create_collection(name)?;
        }
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>, StorageError> {
        self.inner.find(collection, filter, limit)
    }

    fn insert_one(
        &mut self,
        collection: &str,
        document: Document,
    ) -> Result<DocumentId, StorageError> {
        check_finite(&document)?;
        let id = DocumentId::generate();
        let mut documents = self.inner.collection(collection).cloned().unwrap_or_default();
        documents.push((id.clone(), document));
        self.write(collection, &documents)?;
        self.inner.load_collection(collection, documents);
        Ok(id)
    }

    fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StorageError> {
        self.inner.get(collection, id)
    }

    fn count(&self, collection: &str) -> Result<usize, StorageError> {
        self.inner.count(collection)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.insert("name".into(), DocValue::Text("hibiscus".into()));
        doc.insert("blob".into(), DocValue::Binary(vec![1, 2, 3]));
        doc.insert(
            "planted".into(),
            DocValue::DateTime(
                NaiveDate::from_ymd_opt(2019, 7, 21)
                    .unwrap()
                    .and_hms_opt(18, 54, 21)
                    .unwrap(),
            ),
        );
        doc
    }

    #[test]
    fn test_documents_survive_reopen() {
        let root = tempfile::tempdir().unwrap();
        let id = {
            let mut db = JsonFileDatabase::open(root.path(), "garden").unwrap();
            db.create_collection("empty").unwrap();
            db.insert_one("tree", sample()).unwrap()
        };

        let db = JsonFileDatabase::open(root.path(), "garden").unwrap();
        let mut names = db.collection_names().unwrap();
        names.sort();
        assert_eq!(names, vec!["empty".to_string(), "tree".to_string()]);
        assert_eq!(db.get("tree", &id).unwrap(), Some(sample()));
        assert_eq!(db.count("empty").unwrap(), 0);
    }

    #[test]
    fn test_databases_are_separate_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut a = JsonFileDatabase::open(root.path(), "a").unwrap();
        a.insert_one("tree", sample()).unwrap();

        let b = JsonFileDatabase::open(root.path(), "b").unwrap();
        assert!(b.collection_names().unwrap().is_empty());
        assert!(a.dir().ends_with("a"));
    }

    #[test]
    fn test_failed_write_leaves_collection_unchanged() {
        let root = tempfile::tempdir().unwrap();
        let mut db = JsonFileDatabase::open(root.path(), "garden").unwrap();
        let first = db.insert_one("tree", sample()).unwrap();

        // A directory where the temporary file goes makes the write fail.
        let blocker = db.dir().join(".tree.json.tmp");
        fs::create_dir(&blocker).unwrap();
        assert!(matches!(db.insert_one("tree", sample()), Err(StorageError::Io(_))));
        assert_eq!(db.count("tree").unwrap(), 1);

        fs::create_dir(db.dir().join(".shrubs.json.tmp")).unwrap();
        assert!(db.create_collection("shrubs").is_err());
        assert!(db.insert_one("shrubs", sample()).is_err());
        assert!(!db.collection_names().unwrap().contains(&"shrubs".to_string()));

        fs::remove_dir(&blocker).unwrap();
        let second = db.insert_one("tree", sample()).unwrap();
        drop(db);

        let db = JsonFileDatabase::open(root.path(), "garden").unwrap();
        assert_eq!(db.count("tree").unwrap(), 2);
        assert!(db.get("tree", &first).unwrap().is_some());
        assert!(db.get("tree", &second).unwrap().is_some());
    }

    #[test]
    fn test_non_finite_floats_are_rejected_before_writing() {
        let root = tempfile::tempdir().unwrap();
        {
            let mut db = JsonFileDatabase::open(root.path(), "sensors").unwrap();
            let mut reading = Document::new();
            reading.insert("sensor".into(), DocValue::Int(1));
            let mut nested = Document::new();
            nested.insert("value".into(), DocValue::Float(f64::NAN));
            reading.insert("sample".into(), DocValue::Document(nested));
            assert!(matches!(
                db.insert_one("reading", reading),
                Err(StorageError::InvalidValue { ref field, .. }) if field == "sample.value"
            ));

            let mut ok = Document::new();
            ok.insert("value".into(), DocValue::Float(0.25));
            db.insert_one("reading", ok).unwrap();
        }

        let db = JsonFileDatabase::open(root.path(), "sensors").unwrap();
        assert_eq!(db.count("reading").unwrap(), 1);
    }
}
