//! Service layer entry points.
//!
//! # Responsibility
//! - Expose use-case oriented APIs for request-handling callers.
//! - Keep callers independent from the concrete storage backend.

pub mod record_service;
