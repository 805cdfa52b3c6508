//! Record use-case service.
//!
//! # Responsibility
//! - Provide one entry point per inbound operation for request handlers.
//! - Delegate persistence to the shared storage backend.
//!
//! # Invariants
//! - Each service call maps to exactly one backend call.
//! - A delete that matched nothing is an outcome, not an error.

use crate::backend::error::StoreResult;
use crate::backend::{BackendKind, SharedBackend};
use crate::model::record::{Record, RecordId};
use crate::model::target::ConnectionTarget;

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NothingToDelete,
}

/// Use-case service wrapper over a shared backend.
#[derive(Clone)]
pub struct RecordService {
    backend: SharedBackend,
}

impl RecordService {
    /// Creates a service using the provided backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self { backend }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub async fn list_databases(&self) -> StoreResult<Vec<String>> {
        self.backend.list_databases().await
    }

    pub async fn list_collections(&self, database: &str) -> StoreResult<Vec<String>> {
        self.backend.list_collections(database).await
    }

    /// Points subsequent calls at `target`.
    pub async fn set_target(&self, target: ConnectionTarget) -> StoreResult<()> {
        self.backend.set_target(target).await
    }

    pub async fn current_target(&self) -> ConnectionTarget {
        self.backend.current_target().await
    }

    /// Creates a record and returns its backend-assigned ID.
    pub async fn create(&self, record: &Record) -> StoreResult<RecordId> {
        self.backend.create(record).await
    }

    /// Creates a record from title and text.
    pub async fn create_text(
        &self,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> StoreResult<RecordId> {
        self.backend.create(&Record::new(title, text)).await
    }

    pub async fn get(&self, id: RecordId) -> StoreResult<Record> {
        self.backend.get(id).await
    }

    /// Replaces title and text of an existing record.
    ///
    /// Returns backend-level not-found errors unchanged.
    pub async fn update(&self, record: &Record) -> StoreResult<Record> {
        self.backend.update(record).await
    }

    pub async fn delete(&self, id: RecordId) -> StoreResult<DeleteOutcome> {
        let removed = self.backend.delete(id).await?;
        Ok(if removed {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NothingToDelete
        })
    }

    /// Closes the backend handle; later calls fail with a connection error.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.backend.close().await
    }
}
