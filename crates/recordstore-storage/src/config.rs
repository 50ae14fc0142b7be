//! Backend selection and settings.
//!
//! A [`StoreConfig`] names the backend to persist records to and where its
//! data lives. It is usually built from a store URI:
//!
//! - `sqlite://<path>` for a SQLite database file
//! - `sqlite::memory:` for an in-memory SQLite database
//! - `docs://<root>/<database>` for a JSON-file document database
//! - `memdocs://<database>` for an in-memory document database
//! - `noop://` to discard every record

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Environment variable read by [`StoreConfig::from_env`].
pub const URI_ENV_VAR: &str = "RECORDSTORE_URI";

const SQLITE_MEMORY: &str = "sqlite::memory:";

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Sqlite,
    Documents,
    MemoryDocuments,
    Noop,
}

/// Which backend to use and where its data lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Database file (SQLite) or root directory (documents). `None` selects
    /// an in-memory SQLite database.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Database name (document backends only).
    #[serde(default)]
    pub database: Option<String>,
}

impl StoreConfig {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            backend: Backend::Sqlite,
            path: Some(path.into()),
            database: None,
        }
    }

    pub fn sqlite_in_memory() -> Self {
        StoreConfig {
            backend: Backend::Sqlite,
            path: None,
            database: None,
        }
    }

    pub fn documents(root: impl Into<PathBuf>, database: &str) -> Self {
        StoreConfig {
            backend: Backend::Documents,
            path: Some(root.into()),
            database: Some(database.to_string()),
        }
    }

    pub fn memory_documents(database: &str) -> Self {
        StoreConfig {
            backend: Backend::MemoryDocuments,
            path: None,
            database: Some(database.to_string()),
        }
    }

    pub fn noop() -> Self {
        StoreConfig {
            backend: Backend::Noop,
            path: None,
            database: None,
        }
    }

    /// Parses a store URI.
    pub fn from_uri(uri: &str) -> Result<Self, StorageError> {
        let config = if uri == SQLITE_MEMORY {
            StoreConfig::sqlite_in_memory()
        } else if let Some(path) = uri.strip_prefix("sqlite://") {
            StoreConfig::sqlite(path)
        } else if let Some(rest) = uri.strip_prefix("docs://") {
            let Some((root, database)) = rest.rsplit_once('/') else {
                return Err(StorageError::InvalidConfig(format!(
                    "document URI needs <root>/<database>: {}",
                    uri
                )));
            };
            StoreConfig::documents(root, database)
        } else if let Some(database) = uri.strip_prefix("memdocs://") {
            StoreConfig::memory_documents(database)
        } else if uri == "noop://" {
            StoreConfig::noop()
        } else {
            return Err(StorageError::InvalidConfig(format!(
                "unrecognized store URI: {}",
                uri
            )));
        };
        config.validate()?;
        Ok(config)
    }

    /// Reads the store URI from the `RECORDSTORE_URI` environment variable.
    pub fn from_env() -> Result<Self, StorageError> {
        Self::from_env_var(URI_ENV_VAR)
    }

    /// Reads the store URI from the environment variable `name`.
    pub fn from_env_var(name: &str) -> Result<Self, StorageError> {
        let uri = std::env::var(name)
            .map_err(|_| StorageError::InvalidConfig(format!("{} is not set", name)))?;
        Self::from_uri(&uri)
    }

    /// Checks that the settings required by the backend are present.
    pub fn validate(&self) -> Result<(), StorageError> {
        let empty_path = self
            .path
            .as_ref()
            .map_or(true, |p| p.as_os_str().is_empty());
        let empty_database = self.database.as_deref().map_or(true, str::is_empty);

        match self.backend {
            Backend::Sqlite => {
                if self.path.is_some() && empty_path {
                    return Err(StorageError::InvalidConfig(
                        "sqlite backend requires a non-empty path".into(),
                    ));
                }
            }
            Backend::Documents => {
                if empty_path {
                    return Err(StorageError::InvalidConfig(
                        "document backend requires a root directory".into(),
                    ));
                }
                if empty_database {
                    return Err(StorageError::InvalidConfig(
                        "document backend requires a database name".into(),
                    ));
                }
            }
            Backend::MemoryDocuments => {
                if empty_database {
                    return Err(StorageError::InvalidConfig(
                        "document backend requires a database name".into(),
                    ));
                }
            }
            Backend::Noop => {}
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::sqlite_in_memory()
    }
}
