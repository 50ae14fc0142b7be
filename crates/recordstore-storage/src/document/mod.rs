//! Document-store backend.
//!
//! Documents are ordered maps of [`DocValue`]s. A [`DocumentDatabase`] is the
//! handle to one named database inside a document-store connection; the
//! [`DocumentStore`] adapter implements the record contract on top of it.
//!
//! - [`memory`]: InMemoryDatabase, insertion-ordered maps
//! - [`file`]: JsonFileDatabase, one JSON file per collection
//! - [`store`]: DocumentStore adapter

pub mod file;
pub mod memory;
pub mod store;

use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::types::DocumentId;

pub use file::JsonFileDatabase;
pub use memory::InMemoryDatabase;
pub use store::{Collection, DocumentStore};

/// A stored document: field name to value, in insertion order.
pub type Document = IndexMap<String, DocValue>;

/// A value inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocValue {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    DateTime(NaiveDateTime),
    Bool(bool),
    Array(Vec<DocValue>),
    Document(Document),
}

/// Looks up a value by dotted path (`taxonomy.genus`) through embedded
/// documents.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a DocValue> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        match current {
            DocValue::Document(inner) => current = inner.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

/// How a filter condition compares a stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Match {
    /// Exact equality.
    Eq(DocValue),
    /// Text equality under ASCII case folding.
    EqIgnoreCase(String),
}

/// One condition of a [`Filter`].
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub path: String,
    pub matcher: Match,
}

/// A conjunction of conditions on document paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Filter { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns `true` if every condition holds for `document`.
    ///
    /// A missing path only matches `Eq(DocValue::Null)`.
    pub fn matches(&self, document: &Document) -> bool {
        self.conditions.iter().all(|cond| {
            let stored = lookup(document, &cond.path).unwrap_or(&DocValue::Null);
            match (&cond.matcher, stored) {
                (Match::Eq(expected), stored) => expected == stored,
                (Match::EqIgnoreCase(expected), DocValue::Text(stored)) => {
                    expected.eq_ignore_ascii_case(stored)
                }
                (Match::EqIgnoreCase(_), _) => false,
            }
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &cond.matcher {
                Match::Eq(value) => write!(f, "{}: {:?}", cond.path, value)?,
                Match::EqIgnoreCase(value) => write!(f, "{}: ~{:?}", cond.path, value)?,
            }
        }
        write!(f, "}}")
    }
}

/// Handle to one named database of a document store.
pub trait DocumentDatabase {
    /// Database name.
    fn name(&self) -> &str;

    /// Names of all existing collections.
    fn collection_names(&self) -> Result<Vec<String>, StorageError>;

    /// Creates an empty collection. Creating an existing collection is a
    /// no-op.
    fn create_collection(&mut self, name: &str) -> Result<(), StorageError>;

    /// Identifiers of up to `limit` documents matching `filter`, in
    /// insertion order.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DocumentId>, StorageError>;

    /// Inserts a document, creating the collection if needed, and returns
    /// its new identifier.
    fn insert_one(
        &mut self,
        collection: &str,
        document: Document,
    ) -> Result<DocumentId, StorageError>;

    /// Fetches a document by identifier.
    fn get(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>, StorageError>;

    /// Number of documents in a collection (zero if it does not exist).
    fn count(&self, collection: &str) -> Result<usize, StorageError>;
}
