//! Storage contract error types.

use crate::model::record::RecordId;
use std::time::Duration;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by every `StorageBackend` operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend connection could not be established, verified, or is closed.
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation has no meaning for this backend or its current state.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// No record with the given identifier exists in the current target.
    #[error("no record with id {0}")]
    NotFound(RecordId),

    /// A bounded call ran past its deadline.
    #[error("{operation} exceeded its deadline of {}ms", .after.as_millis())]
    DeadlineExceeded {
        operation: &'static str,
        after: Duration,
    },

    /// SQLite failure (prepare, execute, commit).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// MongoDB driver failure.
    #[error("document store error: {0}")]
    Document(#[from] mongodb::error::Error),

    /// Any other lower-level failure (encoding, identifier mismatch, config).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Coarse classification of `StoreError` for callers that only need the
/// failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    Unsupported,
    NotFound,
    DeadlineExceeded,
    Backend,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::Sqlite(_) | Self::Document(_) | Self::Backend(_) => ErrorKind::Backend,
        }
    }

    pub(crate) fn no_target() -> Self {
        Self::Unsupported("no database and collection is set".to_string())
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(value: mongodb::bson::ser::Error) -> Self {
        Self::Backend(format!("failed to encode record: {value}"))
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(value: mongodb::bson::de::Error) -> Self {
        Self::Backend(format!("failed to decode record: {value}"))
    }
}
