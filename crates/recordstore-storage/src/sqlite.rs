//! SQLite implementation of [`RecordStore`].
//!
//! [`SqliteStore`] maps each record type to one table, created on first use.
//! Nested record fields become `<field>_id` columns referencing the nested
//! type's table, and nested records are inserted before their parent.
//! Statements run in autocommit mode: a failure part-way through a nested
//! insert chain leaves the rows inserted so far in place. [`add_atomic`]
//! opts into all-or-nothing behavior for one top-level record.
//!
//! [`add_atomic`]: SqliteStore::add_atomic

use std::collections::HashMap;
use std::path::Path;

use recordstore_core::{FieldSpec, Record, RecordType, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};

use crate::error::StorageError;
use crate::identity::IdentityMap;
use crate::mapper::{self, quote_ident, SqlColumnKind};
use crate::resolve::{key_predicates, KeyPredicates};
use crate::schema::{self, Column, Table};
use crate::traits::RecordStore;
use crate::types::RowId;

const SAVEPOINT: &str = "recordstore_add";

/// SQLite-backed implementation of [`RecordStore`].
pub struct SqliteStore {
    conn: Connection,
    /// Tables known to exist, reflected at construction or created since.
    tables: HashMap<String, Table>,
    ids: IdentityMap<RowId>,
    /// Tables created inside an open `add_atomic` savepoint.
    created_in_savepoint: Option<Vec<String>>,
}

impl SqliteStore {
    /// Opens (or creates) a SQLite database at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = schema::open_database(path)?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory SQLite database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = schema::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection, reflecting the tables it already holds.
    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let tables = schema::reflect_tables(&conn)?;
        Ok(SqliteStore {
            conn,
            tables,
            ids: IdentityMap::new(),
            created_in_savepoint: None,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Drops the memoized row id of `record`, if any. Later adds of the same
    /// instance go through key resolution again.
    pub fn forget(&mut self, record: &Record) -> Option<RowId> {
        self.ids.forget(record.handle())
    }

    /// Drops every memoized row id.
    pub fn clear_memo(&mut self) {
        self.ids.clear();
    }

    /// Names of all known tables, sorted.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Adds `record` like [`RecordStore::add`], but all-or-nothing.
    ///
    /// The whole nested insert chain (including any table creation) runs in
    /// a savepoint. On failure the savepoint is rolled back and identifiers
    /// memoized or tables cached during the call are forgotten.
    pub fn add_atomic(&mut self, record: &Record) -> Result<RowId, StorageError> {
        self.conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))?;
        self.ids.begin_journal();
        self.created_in_savepoint = Some(Vec::new());

        let result = self
            .add(record)
            .and_then(|id| {
                self.conn
                    .execute_batch(&format!("RELEASE {}", SAVEPOINT))
                    .map_err(StorageError::from)?;
                Ok(id)
            });

        let created = self.created_in_savepoint.take().unwrap_or_default();
        match result {
            Ok(id) => {
                self.ids.commit_journal();
                Ok(id)
            }
            Err(err) => {
                let rollback = format!("ROLLBACK TO {0}; RELEASE {0}", SAVEPOINT);
                if let Err(rollback_err) = self.conn.execute_batch(&rollback) {
                    tracing::warn!(error = %rollback_err, "savepoint rollback failed");
                }
                self.ids.rollback_journal();
                for table in created {
                    self.tables.remove(&table);
                }
                Err(err)
            }
        }
    }

    /// Creates the table for `ty` and, first, the tables of its nested
    /// types. Returns the table name. Callers must have validated the type
    /// tree with [`mapper::check_relational`].
    fn create_table(&mut self, ty: &RecordType) -> Result<String, StorageError> {
        let name = ty.entity_name();
        if self.tables.contains_key(&name) {
            return Ok(name);
        }

        let taken: Vec<String> = ty.fields().iter().map(mapper::column_name).collect();
        let mut columns = vec![Column::primary_key(&schema::id_column_name(
            taken.iter().map(String::as_str),
        ))];
        for field in ty.fields() {
            let column = match mapper::sql_column(field)? {
                SqlColumnKind::Foreign(nested) => {
                    let referenced = self.create_table(&nested)?;
                    Column {
                        name: mapper::foreign_column(field),
                        declaration: "INTEGER".to_string(),
                        nullable: true,
                        primary_key: false,
                        references: Some(referenced),
                    }
                }
                SqlColumnKind::Scalar(sql_type) => Column {
                    name: field.name().to_string(),
                    declaration: sql_type.declaration(field.name()),
                    nullable: field.is_nullable(),
                    primary_key: false,
                    references: None,
                },
            };
            columns.push(column);
        }

        let table = Table {
            name: name.clone(),
            columns,
        };
        self.conn.execute_batch(&table.create_sql())?;
        tracing::debug!(table = %name, "created table");

        if let Some(created) = self.created_in_savepoint.as_mut() {
            created.push(name.clone());
        }
        self.tables.insert(name.clone(), table);
        Ok(name)
    }

    /// Assembles the column/value pairs of the row for `record`, persisting
    /// nested records first.
    fn build_row(
        &mut self,
        record: &Record,
        check_exists: bool,
    ) -> Result<Vec<(String, SqlValue)>, StorageError> {
        let mut row = Vec::with_capacity(record.record_type().fields().len());
        for (field, value) in record.entries() {
            let cell = match value {
                Value::Record(nested) => {
                    let id = self.add_with(nested, check_exists)?;
                    (mapper::foreign_column(field), SqlValue::Integer(id.0))
                }
                Value::Null if field.ty().is_record() => {
                    (mapper::foreign_column(field), SqlValue::Null)
                }
                _ => (field.name().to_string(), mapper::sql_value(field, value)?),
            };
            row.push(cell);
        }
        Ok(row)
    }

    /// Fails with [`StorageError::Integrity`] unless `table` has a column
    /// for every field of `ty`.
    fn check_columns(table: &Table, ty: &RecordType) -> Result<(), StorageError> {
        for field in ty.fields() {
            let column = mapper::column_name(field);
            if table.column(&column).is_none() {
                return Err(StorageError::Integrity {
                    reason: format!("table '{}' has no column '{}'", table.name, column),
                });
            }
        }
        Ok(())
    }

    fn insert_row(&self, table: &str, row: &[(String, SqlValue)]) -> Result<RowId, StorageError> {
        let sql = if row.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
        } else {
            let columns: Vec<String> = row.iter().map(|(c, _)| quote_ident(c)).collect();
            let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(table),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        let mut stmt = self.conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(row.iter().map(|(_, v)| v)))?;
        Ok(RowId(self.conn.last_insert_rowid()))
    }
}

/// SQL equality predicates: a `WHERE` fragment and its bound value.
struct SqlPredicates<'a> {
    store: &'a mut SqliteStore,
}

impl KeyPredicates for SqlPredicates<'_> {
    type Predicate = (String, Option<SqlValue>);

    fn scalar(
        &mut self,
        field: &FieldSpec,
        value: &Value,
    ) -> Result<Self::Predicate, StorageError> {
        let column = quote_ident(field.name());
        Ok(match mapper::sql_value(field, value)? {
            SqlValue::Null => (format!("{} IS NULL", column), None),
            bound => (format!("{} = ?", column), Some(bound)),
        })
    }

    fn nested(
        &mut self,
        field: &FieldSpec,
        record: &Record,
    ) -> Result<Option<Vec<Self::Predicate>>, StorageError> {
        let column = quote_ident(&mapper::foreign_column(field));
        Ok(self.store.resolve(record)?.map(|id| {
            vec![(format!("{} = ?", column), Some(SqlValue::Integer(id.0)))]
        }))
    }

    fn nested_null(&mut self, field: &FieldSpec) -> Result<Self::Predicate, StorageError> {
        let column = quote_ident(&mapper::foreign_column(field));
        Ok((format!("{} IS NULL", column), None))
    }
}

impl RecordStore for SqliteStore {
    type Id = RowId;
    type Entity = Table;

    fn resolve(&mut self, record: &Record) -> Result<Option<RowId>, StorageError> {
        if let Some(id) = self.ids.get(record.handle()) {
            return Ok(Some(id));
        }

        let table = record.record_type().entity_name();
        let id_column = match self.tables.get(&table) {
            Some(known) => {
                Self::check_columns(known, record.record_type())?;
                known.id_column().to_string()
            }
            None => return Ok(None),
        };

        let Some(predicates) = key_predicates(&mut SqlPredicates { store: &mut *self }, record)? else {
            return Ok(None);
        };

        let (clauses, bound): (Vec<String>, Vec<Option<SqlValue>>) = predicates.into_iter().unzip();
        let sql = format!(
            "SELECT {id} FROM {table} WHERE {clauses} ORDER BY {id} LIMIT 2",
            id = quote_ident(&id_column),
            table = quote_ident(&table),
            clauses = clauses.join(" AND "),
        );
        tracing::debug!(statement = %sql, "find statement");

        let found: Vec<i64> = {
            let mut stmt = self.conn.prepare_cached(&sql)?;
            let rows = stmt.query_map(params_from_iter(bound.iter().flatten()), |row| {
                row.get::<_, i64>(0)
            })?;
            rows.collect::<Result<Vec<i64>, _>>()?
        };

        if found.len() > 1 {
            tracing::warn!(
                table = %table,
                "key fields match more than one row; using the lowest id"
            );
        }
        let Some(&id) = found.first() else {
            return Ok(None);
        };

        let id = RowId(id);
        self.ids.remember(record.handle(), id);
        Ok(Some(id))
    }

    fn add_with(&mut self, record: &Record, check_exists: bool) -> Result<RowId, StorageError> {
        if let Some(id) = self.ids.get(record.handle()) {
            tracing::debug!(record = %record.handle(), %id, "memoized row id");
            return Ok(id);
        }

        if check_exists {
            if let Some(id) = self.resolve(record)? {
                return Ok(id);
            }
        }

        let table = self.require_entity(record.record_type())?.name;
        let row = self.build_row(record, check_exists)?;
        let id = self.insert_row(&table, &row)?;
        tracing::debug!(table = %table, %id, "added row");

        self.ids.remember(record.handle(), id);
        Ok(id)
    }

    fn require_entity(&mut self, ty: &RecordType) -> Result<Table, StorageError> {
        if let Some(table) = self.tables.get(&ty.entity_name()) {
            Self::check_columns(table, ty)?;
            return Ok(table.clone());
        }
        mapper::check_relational(ty)?;
        let name = self.create_table(ty)?;
        self.tables
            .get(&name)
            .cloned()
            .ok_or(StorageError::UnknownEntity(name))
    }

    fn get_entity(&self, ty: &RecordType) -> Result<Table, StorageError> {
        let name = ty.entity_name();
        self.tables
            .get(&name)
            .cloned()
            .ok_or(StorageError::UnknownEntity(name))
    }
}
