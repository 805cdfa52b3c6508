//! Record table layout and catalog lookups.
//!
//! The on-disk layout is `textfiles(id integer primary key, title text, name text)`;
//! the `name` column holds `Record::text`.

use crate::backend::error::{StoreError, StoreResult};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;

/// Table created on every open.
pub const RECORD_TABLE: &str = "textfiles";

const LIST_TABLES_SQL: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name;";

static TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("table name pattern is valid")
});

/// Rejects anything that is not a plain SQL identifier.
pub fn validate_table_name(name: &str) -> StoreResult<&str> {
    if TABLE_NAME_RE.is_match(name) && !name.to_ascii_lowercase().starts_with("sqlite_") {
        return Ok(name);
    }
    Err(StoreError::Unsupported(format!(
        "`{name}` is not a usable table name"
    )))
}

/// Lists user tables from the system catalog.
pub fn list_tables(conn: &Connection) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(LIST_TABLES_SQL)?;
    let mut rows = stmt.query([])?;
    let mut tables = Vec::new();
    while let Some(row) = rows.next()? {
        tables.push(row.get::<_, String>(0)?);
    }
    Ok(tables)
}

/// Creates a record table unless the catalog already lists it.
///
/// Returns `true` when the table was created by this call.
pub fn ensure_record_table(conn: &Connection, table: &str) -> StoreResult<bool> {
    let table = validate_table_name(table)?;
    // SQLite resolves table names case-insensitively.
    if list_tables(conn)?
        .iter()
        .any(|existing| existing.eq_ignore_ascii_case(table))
    {
        return Ok(false);
    }

    conn.execute_batch(&format!(
        "CREATE TABLE {table} (id INTEGER NOT NULL PRIMARY KEY, title TEXT, name TEXT);"
    ))?;
    info!("event=table_create module=db status=ok table={table}");
    Ok(true)
}
