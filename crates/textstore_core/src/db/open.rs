//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open the store file (optionally discarding previous contents) or an
//!   in-memory database.
//! - Configure the busy timeout and create the default record table.
//!
//! # Invariants
//! - Returned connections have the `textfiles` table.
//! - A fresh open never reuses rows written by an earlier process.

use super::schema::{ensure_record_table, RECORD_TABLE};
use crate::backend::error::{StoreError, StoreResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::io::ErrorKind;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens the SQLite store file and creates the record table if absent.
///
/// # Side effects
/// - With `fresh = true`, removes any existing file at `path` first.
/// - Emits `db_open` logging events with duration and status.
pub fn open_store_file(
    path: impl AsRef<Path>,
    fresh: bool,
    busy_timeout: Duration,
) -> StoreResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file fresh={} path={}",
        fresh,
        path.display()
    );

    if fresh {
        discard_existing_file(path)?;
    }

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(StoreError::Connection(format!(
                "cannot open sqlite file `{}`: {err}",
                path.display()
            )));
        }
    };

    finish_open(&mut conn, "file", busy_timeout, started_at)?;
    Ok(conn)
}

/// Opens an in-memory SQLite database with the record table.
pub fn open_store_in_memory() -> StoreResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = Connection::open_in_memory()
        .map_err(|err| StoreError::Connection(format!("cannot open in-memory sqlite: {err}")))?;
    finish_open(&mut conn, "memory", Duration::from_secs(5), started_at)?;
    Ok(conn)
}

fn finish_open(
    conn: &mut Connection,
    mode: &str,
    busy_timeout: Duration,
    started_at: Instant,
) -> StoreResult<()> {
    match bootstrap_connection(conn, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(StoreError::Connection(format!(
                "cannot initialize sqlite store: {err}"
            )))
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)?;
    ensure_record_table(conn, RECORD_TABLE)?;
    Ok(())
}

fn discard_existing_file(path: &Path) -> StoreResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            warn!(
                "event=db_reset module=db status=ok path={}",
                path.display()
            );
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(StoreError::Connection(format!(
            "cannot discard sqlite file `{}`: {err}",
            path.display()
        ))),
    }
}
