//! Table metadata and SQL schema setup for the SQLite backend.
//!
//! Tables are not declared up front: they are derived from record types on
//! first use. This module holds the adapter-side description of a table
//! ([`Table`], [`Column`]), renders `CREATE TABLE` statements, and reflects
//! the tables already present in a database into that description.

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection};

use crate::error::StorageError;
use crate::mapper::quote_ident;

/// Preferred name of the generated primary key column.
pub const ID_COLUMN: &str = "id";

/// Rowid alias of tables that declare no primary key column.
const ROWID: &str = "rowid";

/// Name for the generated primary key column of a table whose field columns
/// are `taken`: `id`, prefixed with underscores until it is free.
pub fn id_column_name<'a>(taken: impl IntoIterator<Item = &'a str>) -> String {
    let taken: Vec<&str> = taken.into_iter().collect();
    let mut name = ID_COLUMN.to_string();
    while taken.contains(&name.as_str()) {
        name.insert(0, '_');
    }
    name
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Declared type, including collation and check clauses.
    pub declaration: String,
    pub nullable: bool,
    pub primary_key: bool,
    /// Referenced table, for foreign reference columns.
    pub references: Option<String>,
}

impl Column {
    /// The generated `INTEGER NOT NULL PRIMARY KEY` column.
    pub fn primary_key(name: &str) -> Self {
        Column {
            name: name.to_string(),
            declaration: "INTEGER".to_string(),
            nullable: false,
            primary_key: true,
            references: None,
        }
    }

    fn definition(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.declaration);
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        }
        // Without a column list the reference targets the primary key,
        // whatever it is named.
        if let Some(table) = &self.references {
            def.push_str(&format!(" REFERENCES {}", quote_ident(table)));
        }
        def
    }
}

/// Adapter-side description of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Name of the column holding row identifiers.
    pub fn id_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map_or(ROWID, |c| c.name.as_str())
    }

    /// Renders the `CREATE TABLE` statement for this table.
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(Column::definition).collect();
        format!(
            "CREATE TABLE {} ({})",
            quote_ident(&self.name),
            columns.join(", ")
        )
    }
}

/// Opens (or creates) a SQLite database at `path` with WAL mode and foreign
/// keys enabled.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with foreign keys enabled.
pub fn open_in_memory() -> Result<Connection, StorageError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Off by default; `<field>_id` references rely on it.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Reads the description of every user table in the database.
pub fn reflect_tables(conn: &Connection) -> Result<HashMap<String, Table>, StorageError> {
    let names: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<String>, _>>()?
    };

    let mut tables = HashMap::with_capacity(names.len());
    for name in names {
        let references: HashMap<String, String> = {
            let mut stmt =
                conn.prepare("SELECT \"from\", \"table\" FROM pragma_foreign_key_list(?1)")?;
            let rows = stmt.query_map(params![name], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<HashMap<String, String>, _>>()?
        };

        let mut stmt =
            conn.prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map(params![name], |row| {
            let column: String = row.get(0)?;
            let declaration: String = row.get(1)?;
            let not_null: bool = row.get(2)?;
            let pk: i64 = row.get(3)?;
            Ok((column, declaration, not_null, pk))
        })?;
        let mut columns = Vec::new();
        for row in rows {
            let (column, declaration, not_null, pk) = row?;
            columns.push(Column {
                references: references.get(&column).cloned(),
                name: column,
                declaration,
                nullable: !not_null && pk == 0,
                primary_key: pk > 0,
            });
        }
        tracing::debug!(table = %name, columns = columns.len(), "reflected table");
        tables.insert(name.clone(), Table { name, columns });
    }
    Ok(tables)
}
