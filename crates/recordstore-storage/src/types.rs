//! Backend-assigned identifiers.
//!
//! Identifiers are a storage concern: a record only gains one once persisted,
//! and it is meaningful only within the adapter instance that assigned it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Row identifier assigned by the relational backend.
///
/// The inner `i64` aligns with SQLite's `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(pub i64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque document identifier assigned by a document database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        DocumentId(uuid::Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of any backend, used where the backend is chosen at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Identifier {
    Row(RowId),
    Document(DocumentId),
    /// Returned by the no-op backend, which stores nothing.
    None,
}

impl From<RowId> for Identifier {
    fn from(id: RowId) -> Self {
        Identifier::Row(id)
    }
}

impl From<DocumentId> for Identifier {
    fn from(id: DocumentId) -> Self {
        Identifier::Document(id)
    }
}

impl From<()> for Identifier {
    fn from(_: ()) -> Self {
        Identifier::None
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Row(id) => write!(f, "row {}", id),
            Identifier::Document(id) => write!(f, "document {}", id),
            Identifier::None => write!(f, "none"),
        }
    }
}
