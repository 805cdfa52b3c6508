//! SQLite file bootstrap and schema entry points.
//!
//! # Responsibility
//! - Open and configure the single SQLite connection owned by the relational backend.
//! - Create record tables after probing the catalog.
//!
//! # Invariants
//! - Table names reaching SQL text have passed `validate_table_name`.
//! - Core code must not read/write records before the default table exists.

mod open;
pub mod schema;

pub use open::{open_store_file, open_store_in_memory};
pub use schema::{ensure_record_table, list_tables, validate_table_name, RECORD_TABLE};
