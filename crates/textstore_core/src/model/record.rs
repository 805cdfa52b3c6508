//! Record domain model.
//!
//! # Responsibility
//! - Define the text record persisted by every storage backend.
//!
//! # Invariants
//! - `id` is stable for the record lifetime once a backend assigned it.
//! - `id == 0` marks a record that has not been persisted yet.

use serde::{Deserialize, Serialize};

/// Backend-assigned record identifier.
///
/// Both backends hand out 32-bit identifiers; wider values are rejected
/// at the storage boundary.
pub type RecordId = i32;

/// Identifier carried by records that were never persisted.
pub const UNASSIGNED_ID: RecordId = 0;

/// Text record persisted through the storage contract.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Backend-assigned identifier; `0` before the first `create`.
    #[serde(default)]
    pub id: RecordId,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub text: String,
}

impl Record {
    /// Creates an unpersisted record.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_id(UNASSIGNED_ID, title, text)
    }

    /// Creates a record addressing an existing identifier.
    ///
    /// Used by update paths where identity already exists in a backend.
    pub fn with_id(id: RecordId, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            text: text.into(),
        }
    }

    /// Returns whether a backend has assigned this record an identifier.
    pub fn is_persisted(&self) -> bool {
        self.id != UNASSIGNED_ID
    }
}
