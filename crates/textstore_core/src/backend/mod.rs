//! Storage backend contract and its implementations.
//!
//! # Responsibility
//! - Define the one operation set every backend implements.
//! - Build a shared backend instance from `BackendConfig`.
//!
//! # Invariants
//! - CRUD operations require a set target and fail with
//!   `StoreError::Unsupported` otherwise, never with `NotFound`.
//! - `list_databases`/`list_collections` are valid without a target.
//! - Every operation after `close` fails with `StoreError::Connection`.

pub mod document;
pub mod error;
pub mod relational;
pub mod target;

use crate::config::BackendConfig;
use crate::model::record::{Record, RecordId};
use crate::model::target::ConnectionTarget;
use async_trait::async_trait;
use self::error::{StoreError, StoreResult};
use log::{error, info};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use document::DocumentStoreBackend;
pub use relational::RelationalFileBackend;

/// Backend family, used for logs and capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Document,
    Relational,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Relational => "relational",
        }
    }
}

/// Uniform CRUD contract over a storage backend.
///
/// Implementations are shared by concurrent callers through
/// [`SharedBackend`]; `set_target` is serialized against in-flight CRUD
/// calls.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Enumerates logical databases visible to the connection.
    async fn list_databases(&self) -> StoreResult<Vec<String>>;

    /// Enumerates collection (or table) names under `database`.
    async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>>;

    /// Replaces the target used by subsequent CRUD calls.
    async fn set_target(&self, target: ConnectionTarget) -> StoreResult<()>;

    async fn current_target(&self) -> ConnectionTarget;

    /// Persists a new record and returns the backend-assigned identifier.
    ///
    /// Any identifier carried by `record` is ignored.
    async fn create(&self, record: &Record) -> StoreResult<RecordId>;

    async fn get(&self, id: RecordId) -> StoreResult<Record>;

    /// Replaces title and text of an existing record.
    async fn update(&self, record: &Record) -> StoreResult<Record>;

    /// Returns `false` when nothing matched `id`.
    async fn delete(&self, id: RecordId) -> StoreResult<bool>;

    /// Closes the underlying handle. Only the first call has effect.
    async fn close(&self) -> StoreResult<()>;
}

/// Shared backend reference.
pub type SharedBackend = Arc<dyn StorageBackend>;

/// Connects the backend described by `config`.
///
/// Failure here is a startup failure; there is no degraded mode.
pub async fn connect_backend(config: &BackendConfig) -> StoreResult<SharedBackend> {
    config.validate()?;
    let backend: SharedBackend = match config {
        BackendConfig::Document(settings) => {
            Arc::new(DocumentStoreBackend::connect(settings.clone()).await?)
        }
        BackendConfig::Relational(settings) => {
            Arc::new(RelationalFileBackend::connect(settings.clone()).await?)
        }
    };
    Ok(backend)
}

/// Runs `operation` under `limit`, mapping expiry to `DeadlineExceeded`.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    future: F,
) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::DeadlineExceeded {
            operation,
            after: limit,
        }),
    }
}

/// Emits one `store_op` event for a finished contract call.
pub(crate) fn log_outcome<T>(
    kind: BackendKind,
    operation: &str,
    started_at: Instant,
    result: &StoreResult<T>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => info!(
            "event=store_op module=backend backend={} op={} status=ok duration_ms={}",
            kind.as_str(),
            operation,
            duration_ms
        ),
        Err(err) => error!(
            "event=store_op module=backend backend={} op={} status=error duration_ms={} error_kind={:?} error={}",
            kind.as_str(),
            operation,
            duration_ms,
            err.kind(),
            err
        ),
    }
}
