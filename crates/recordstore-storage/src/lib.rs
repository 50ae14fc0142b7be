//! Persistence adapters for typed records.
//!
//! Provides the [`RecordStore`] trait defining the contract every backend
//! implements (existence check, deduplicating insert, lazy entity creation)
//! plus the bundled backends: [`SqliteStore`] (relational),
//! [`DocumentStore`] (document store, over an in-memory or JSON-file
//! database) and [`NoopStore`].
//!
//! # Architecture
//!
//! Storage entities are derived from record types on first use. Identity
//! is decided by key fields only; nested key records are resolved first,
//! through a backend-agnostic walk ([`resolve::key_predicates`]) that each
//! backend parameterizes with its own predicate vocabulary.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: RowId, DocumentId and Identifier
//! - [`traits`]: RecordStore trait definition
//! - [`identity`]: per-instance identifier memo
//! - [`mapper`]: field type to storage type mapping
//! - [`resolve`]: key predicate construction shared by backends
//! - [`schema`]: table metadata, SQL setup and reflection
//! - [`sqlite`]: SqliteStore implementation
//! - [`document`]: document databases and DocumentStore
//! - [`noop`]: NoopStore implementation
//! - [`config`]: StoreConfig and store URIs
//! - [`any`]: AnyStore, a backend chosen at runtime

pub mod any;
pub mod config;
pub mod document;
pub mod error;
pub mod identity;
pub mod mapper;
pub mod noop;
pub mod resolve;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use any::{AnyEntity, AnyStore};
pub use config::{Backend, StoreConfig};
pub use document::{DocumentDatabase, DocumentStore, InMemoryDatabase, JsonFileDatabase};
pub use error::StorageError;
pub use noop::NoopStore;
pub use sqlite::SqliteStore;
pub use traits::RecordStore;
pub use types::{DocumentId, Identifier, RowId};
