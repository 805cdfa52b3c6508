//! Core storage layer for textstore.
//! One CRUD contract over a MongoDB backend and a single-file SQLite backend.

pub mod backend;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;

pub use backend::error::{ErrorKind, StoreError, StoreResult};
pub use backend::{
    connect_backend, BackendKind, DocumentStoreBackend, RelationalFileBackend, SharedBackend,
    StorageBackend,
};
pub use config::{BackendConfig, DocumentStoreConfig, RelationalStoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LogDestination};
pub use model::record::{Record, RecordId, UNASSIGNED_ID};
pub use model::target::ConnectionTarget;
pub use service::record_service::{DeleteOutcome, RecordService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
