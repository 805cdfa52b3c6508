//! Connection target model.

use serde::{Deserialize, Serialize};

/// Database and collection a backend resolves CRUD calls against.
///
/// Empty strings mean "unset". Relational backends only honor the
/// `collection` part, which names a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionTarget {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub collection: String,
}

impl ConnectionTarget {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Returns whether both database and collection are set.
    pub fn is_set(&self) -> bool {
        !self.database.is_empty() && !self.collection.is_empty()
    }

    /// Returns whether the collection part is set.
    pub fn has_collection(&self) -> bool {
        !self.collection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionTarget;

    #[test]
    fn default_target_is_unset() {
        let target = ConnectionTarget::default();
        assert!(!target.is_set());
        assert!(!target.has_collection());
    }

    #[test]
    fn target_needs_both_parts_to_be_set() {
        assert!(!ConnectionTarget::new("", "notes").is_set());
        assert!(ConnectionTarget::new("", "notes").has_collection());
        assert!(!ConnectionTarget::new("main", "").is_set());
        assert!(ConnectionTarget::new("main", "notes").is_set());
    }
}
