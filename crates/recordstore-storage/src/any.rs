//! Backend chosen at runtime from a [`StoreConfig`].

use recordstore_core::{Record, RecordType};

use crate::config::{Backend, StoreConfig};
use crate::document::{Collection, DocumentStore, InMemoryDatabase, JsonFileDatabase};
use crate::error::StorageError;
use crate::noop::NoopStore;
use crate::schema::Table;
use crate::sqlite::SqliteStore;
use crate::traits::RecordStore;
use crate::types::Identifier;

/// Any of the bundled backends behind one [`RecordStore`] implementation.
pub enum AnyStore {
    Sqlite(SqliteStore),
    Documents(DocumentStore<JsonFileDatabase>),
    MemoryDocuments(DocumentStore<InMemoryDatabase>),
    Noop(NoopStore),
}

/// Storage entity of any backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyEntity {
    Table(Table),
    Collection(Collection),
    None,
}

impl AnyStore {
    /// Opens the backend described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let store = match (config.backend, &config.path, &config.database) {
            (Backend::Sqlite, Some(path), _) => AnyStore::Sqlite(SqliteStore::new(path)?),
            (Backend::Sqlite, None, _) => AnyStore::Sqlite(SqliteStore::in_memory()?),
            (Backend::Documents, Some(root), Some(database)) => {
                let db = JsonFileDatabase::open(root, database)?;
                AnyStore::Documents(DocumentStore::new(db)?)
            }
            (Backend::MemoryDocuments, _, Some(database)) => {
                let db = InMemoryDatabase::new(database);
                AnyStore::MemoryDocuments(DocumentStore::new(db)?)
            }
            (Backend::Noop, _, _) => AnyStore::Noop(NoopStore::new()),
            (backend, _, _) => {
                return Err(StorageError::InvalidConfig(format!(
                    "incomplete settings for {:?} backend",
                    backend
                )))
            }
        };
        tracing::info!(backend = ?config.backend, "opened record store");
        Ok(store)
    }

    pub fn backend(&self) -> Backend {
        match self {
            AnyStore::Sqlite(_) => Backend::Sqlite,
            AnyStore::Documents(_) => Backend::Documents,
            AnyStore::MemoryDocuments(_) => Backend::MemoryDocuments,
            AnyStore::Noop(_) => Backend::Noop,
        }
    }
}

impl RecordStore for AnyStore {
    type Id = Identifier;
    type Entity = AnyEntity;

    fn resolve(&mut self, record: &Record) -> Result<Option<Identifier>, StorageError> {
        Ok(match self {
            AnyStore::Sqlite(store) => store.resolve(record)?.map(Identifier::from),
            AnyStore::Documents(store) => store.resolve(record)?.map(Identifier::from),
            AnyStore::MemoryDocuments(store) => store.resolve(record)?.map(Identifier::from),
            AnyStore::Noop(store) => store.resolve(record)?.map(Identifier::from),
        })
    }

    fn add_with(&mut self, record: &Record, check_exists: bool) -> Result<Identifier, StorageError> {
        Ok(match self {
            AnyStore::Sqlite(store) => store.add_with(record, check_exists)?.into(),
            AnyStore::Documents(store) => store.add_with(record, check_exists)?.into(),
            AnyStore::MemoryDocuments(store) => store.add_with(record, check_exists)?.into(),
            AnyStore::Noop(store) => store.add_with(record, check_exists)?.into(),
        })
    }

    fn require_entity(&mut self, ty: &RecordType) -> Result<AnyEntity, StorageError> {
        Ok(match self {
            AnyStore::Sqlite(store) => AnyEntity::Table(store.require_entity(ty)?),
            AnyStore::Documents(store) => AnyEntity::Collection(store.require_entity(ty)?),
            AnyStore::MemoryDocuments(store) => AnyEntity::Collection(store.require_entity(ty)?),
            AnyStore::Noop(store) => {
                store.require_entity(ty)?;
                AnyEntity::None
            }
        })
    }

    fn get_entity(&self, ty: &RecordType) -> Result<AnyEntity, StorageError> {
        Ok(match self {
            AnyStore::Sqlite(store) => AnyEntity::Table(store.get_entity(ty)?),
            AnyStore::Documents(store) => AnyEntity::Collection(store.get_entity(ty)?),
            AnyStore::MemoryDocuments(store) => AnyEntity::Collection(store.get_entity(ty)?),
            AnyStore::Noop(store) => {
                store.get_entity(ty)?;
                AnyEntity::None
            }
        })
    }
}
