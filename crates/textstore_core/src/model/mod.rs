//! Records and targets exchanged through the storage contract.
//!
//! # Responsibility
//! - Define the persisted `Record` shape shared by every backend.
//! - Define the `ConnectionTarget` a backend resolves CRUD calls against.
//!
//! # Invariants
//! - A record identifier is assigned by the backend, never by the caller.
//! - An identifier of zero means "not yet persisted".

pub mod record;
pub mod target;
