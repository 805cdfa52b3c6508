//! SQLite-backed implementation of the storage contract.
//!
//! # Responsibility
//! - Persist records in a single local SQLite file.
//! - Run every write inside its own transaction.
//!
//! # Invariants
//! - The connection is opened once in `connect` and closed once in `close`.
//! - A failed prepare/execute/commit rolls the transaction back; callers
//!   never observe a partial write.
//! - Only the collection part of a target has effect; it names a table.

use super::error::{StoreError, StoreResult};
use super::target::TargetSlot;
use super::{log_outcome, BackendKind, StorageBackend};
use crate::config::RelationalStoreConfig;
use crate::db::{ensure_record_table, list_tables, open_store_file, validate_table_name};
use crate::model::record::{Record, RecordId};
use crate::model::target::ConnectionTarget;
use async_trait::async_trait;
use log::{info, warn};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const KIND: BackendKind = BackendKind::Relational;

/// Storage backend over one SQLite file.
///
/// # Capability limits
/// - There is exactly one implicit database: `list_databases` always fails
///   with `StoreError::Unsupported`, `list_collections` ignores its argument,
///   and `set_target` records but ignores `ConnectionTarget::database`.
/// - `ConnectionTarget::collection` selects the table. Unknown tables are
///   created with the record layout when the target is set.
///
/// The connection is not `Sync`; calls are serialized behind a mutex and run
/// on the blocking thread pool.
pub struct RelationalFileBackend {
    conn: Arc<Mutex<Option<Connection>>>,
    connected: AtomicBool,
    target: TargetSlot,
    path: Option<PathBuf>,
}

impl RelationalFileBackend {
    /// Opens the configured file and prepares the record table.
    ///
    /// # Errors
    /// - `StoreError::Connection` when the file cannot be discarded, opened,
    ///   or initialized.
    pub async fn connect(config: RelationalStoreConfig) -> StoreResult<Self> {
        let path = config.path.clone();
        let conn = tokio::task::spawn_blocking(move || {
            open_store_file(&config.path, config.fresh_on_open, config.busy_timeout())
        })
        .await
        .map_err(|err| StoreError::Connection(format!("sqlite open task failed: {err}")))??;

        info!(
            "event=backend_connect module=backend backend={} status=ok path={}",
            KIND.as_str(),
            path.display()
        );
        Ok(Self::with_connection(conn, Some(path)))
    }

    /// Wraps an already bootstrapped connection (see `db::open_store_in_memory`).
    pub fn from_connection(conn: Connection) -> Self {
        Self::with_connection(conn, None)
    }

    fn with_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            connected: AtomicBool::new(true),
            target: TargetSlot::new(),
            path,
        }
    }

    /// Store file path; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(closed())
        }
    }

    async fn run<T, F>(&self, work: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let conn = guard.as_mut().ok_or_else(closed)?;
            work(conn)
        })
        .await
        .map_err(|err| StoreError::Backend(format!("sqlite task failed: {err}")))?
    }

    async fn list_collections_inner(&self) -> StoreResult<Vec<String>> {
        self.ensure_open()?;
        self.run(|conn| list_tables(conn)).await
    }

    async fn set_target_inner(&self, target: ConnectionTarget) -> StoreResult<()> {
        self.ensure_open()?;
        if target.has_collection() {
            let table = validate_table_name(&target.collection)?.to_string();
            self.run(move |conn| ensure_record_table(conn, &table)).await?;
        }
        if !target.database.is_empty() {
            warn!(
                "event=target_set module=backend backend={} status=partial ignored_database={}",
                KIND.as_str(),
                target.database
            );
        }
        self.target.replace(target).await;
        Ok(())
    }

    async fn create_inner(&self, record: &Record) -> StoreResult<RecordId> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let table = table_of(&target)?;
        let title = record.title.clone();
        let text = record.text.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let rowid = {
                let mut stmt =
                    tx.prepare(&format!("INSERT INTO {table} (title, name) VALUES (?1, ?2);"))?;
                stmt.insert(params![title, text])?
            };
            tx.commit()?;
            narrow_rowid(rowid)
        })
        .await
    }

    async fn get_inner(&self, id: RecordId) -> StoreResult<Record> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let table = table_of(&target)?;

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id, title, name FROM {table} WHERE id = ?1;"
            ))?;
            let mut rows = stmt.query([id])?;
            let mut found: Option<Record> = None;
            while let Some(row) = rows.next()? {
                if found.is_some() {
                    return Err(StoreError::Backend(format!(
                        "more than one row in `{table}` for id {id}"
                    )));
                }
                found = Some(parse_record_row(row)?);
            }

            match found {
                Some(record) if record.is_persisted() => Ok(record),
                _ => Err(StoreError::NotFound(id)),
            }
        })
        .await
    }

    async fn update_inner(&self, record: &Record) -> StoreResult<Record> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let table = table_of(&target)?;
        if !record.is_persisted() {
            return Err(StoreError::NotFound(record.id));
        }
        let updated = record.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let changed = {
                let mut stmt = tx.prepare(&format!(
                    "UPDATE {table} SET title = ?1, name = ?2 WHERE id = ?3;"
                ))?;
                stmt.execute(params![updated.title, updated.text, updated.id])?
            };
            tx.commit()?;

            if changed == 0 {
                return Err(StoreError::NotFound(updated.id));
            }
            Ok(updated)
        })
        .await
    }

    async fn delete_inner(&self, id: RecordId) -> StoreResult<bool> {
        self.ensure_open()?;
        let target = self.target.pin().await;
        let table = table_of(&target)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let changed = {
                let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1;"))?;
                stmt.execute([id])?
            };
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
    }

    async fn close_inner(&self) -> StoreResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let taken = conn
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .take();
            match taken {
                // On failure the returned handle is dropped, which still closes it.
                Some(conn) => conn.close().map_err(|(_, err)| StoreError::Sqlite(err)),
                None => Ok(()),
            }
        })
        .await
        .map_err(|err| StoreError::Backend(format!("sqlite close task failed: {err}")))?
    }
}

#[async_trait]
impl StorageBackend for RelationalFileBackend {
    fn kind(&self) -> BackendKind {
        KIND
    }

    async fn list_databases(&self) -> StoreResult<Vec<String>> {
        let started_at = Instant::now();
        let result: StoreResult<Vec<String>> = Err(StoreError::Unsupported(
            "sqlite supports only a single database".to_string(),
        ));
        log_outcome(KIND, "list_databases", started_at, &result);
        result
    }

    async fn list_collections(&self, _database: &str) -> StoreResult<Vec<String>> {
        let started_at = Instant::now();
        let result = self.list_collections_inner().await;
        log_outcome(KIND, "list_collections", started_at, &result);
        result
    }

    async fn set_target(&self, target: ConnectionTarget) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.set_target_inner(target).await;
        log_outcome(KIND, "set_target", started_at, &result);
        result
    }

    async fn current_target(&self) -> ConnectionTarget {
        self.target.snapshot().await
    }

    async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        let started_at = Instant::now();
        let result = self.create_inner(record).await;
        log_outcome(KIND, "create", started_at, &result);
        result
    }

    async fn get(&self, id: RecordId) -> StoreResult<Record> {
        let started_at = Instant::now();
        let result = self.get_inner(id).await;
        log_outcome(KIND, "get", started_at, &result);
        result
    }

    async fn update(&self, record: &Record) -> StoreResult<Record> {
        let started_at = Instant::now();
        let result = self.update_inner(record).await;
        log_outcome(KIND, "update", started_at, &result);
        result
    }

    async fn delete(&self, id: RecordId) -> StoreResult<bool> {
        let started_at = Instant::now();
        let result = self.delete_inner(id).await;
        log_outcome(KIND, "delete", started_at, &result);
        result
    }

    async fn close(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.close_inner().await;
        log_outcome(KIND, "close", started_at, &result);
        result
    }
}

fn table_of(target: &ConnectionTarget) -> StoreResult<String> {
    if !target.has_collection() {
        return Err(StoreError::no_target());
    }
    Ok(validate_table_name(&target.collection)?.to_string())
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    Ok(Record {
        id: row.get("id")?,
        title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        text: row.get::<_, Option<String>>("name")?.unwrap_or_default(),
    })
}

fn narrow_rowid(rowid: i64) -> StoreResult<RecordId> {
    RecordId::try_from(rowid).map_err(|_| {
        StoreError::Backend(format!("rowid {rowid} does not fit a 32-bit record id"))
    })
}

fn closed() -> StoreError {
    StoreError::Connection("sqlite backend is closed".to_string())
}
