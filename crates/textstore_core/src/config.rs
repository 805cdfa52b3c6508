//! Backend connection configuration.
//!
//! # Responsibility
//! - Describe how to reach each storage backend and how long each call may take.
//! - Load configuration from JSON files or `TEXTSTORE_*` environment variables.
//!
//! # Invariants
//! - Every timeout is non-zero.
//! - Fresh-state mode for the SQLite file is opt-in.

use crate::backend::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MONGO_URI: &str = "mongodb://127.0.0.1:27017";
pub const DEFAULT_SQLITE_PATH: &str = "./testdb.db";

pub const ENV_BACKEND: &str = "TEXTSTORE_BACKEND";
pub const ENV_MONGO_URI: &str = "TEXTSTORE_MONGO_URI";
pub const ENV_SQLITE_PATH: &str = "TEXTSTORE_SQLITE_PATH";
pub const ENV_SQLITE_FRESH: &str = "TEXTSTORE_SQLITE_FRESH";

/// Which backend to connect, with its settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    Document(DocumentStoreConfig),
    Relational(RelationalStoreConfig),
}

/// MongoDB connection settings. Timeouts are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreConfig {
    pub uri: String,
    /// Bound on building the client.
    pub connect_timeout_ms: u64,
    /// Bound on the liveness ping issued at construction.
    pub ping_timeout_ms: u64,
    /// Bound on listing databases.
    pub list_databases_timeout_ms: u64,
    /// Bound on listing collections of one database.
    pub list_collections_timeout_ms: u64,
    /// Bound on create/get/update/delete.
    pub point_timeout_ms: u64,
    /// Bound on shutdown.
    pub close_timeout_ms: u64,
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGO_URI.to_string(),
            connect_timeout_ms: 10_000,
            ping_timeout_ms: 5_000,
            list_databases_timeout_ms: 2_000,
            list_collections_timeout_ms: 20_000,
            point_timeout_ms: 5_000,
            close_timeout_ms: 2_000,
        }
    }
}

impl DocumentStoreConfig {
    pub fn with_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn list_databases_timeout(&self) -> Duration {
        Duration::from_millis(self.list_databases_timeout_ms)
    }

    pub fn list_collections_timeout(&self) -> Duration {
        Duration::from_millis(self.list_collections_timeout_ms)
    }

    pub fn point_timeout(&self) -> Duration {
        Duration::from_millis(self.point_timeout_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    fn validate(&self) -> StoreResult<()> {
        if self.uri.trim().is_empty() {
            return Err(invalid("document store uri cannot be empty"));
        }
        let timeouts = [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("ping_timeout_ms", self.ping_timeout_ms),
            ("list_databases_timeout_ms", self.list_databases_timeout_ms),
            ("list_collections_timeout_ms", self.list_collections_timeout_ms),
            ("point_timeout_ms", self.point_timeout_ms),
            ("close_timeout_ms", self.close_timeout_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(invalid(&format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

/// SQLite file settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalStoreConfig {
    pub path: PathBuf,
    /// Delete any existing file before opening it.
    pub fresh_on_open: bool,
    /// How long a statement waits on a locked database.
    pub busy_timeout_ms: u64,
}

impl Default for RelationalStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_SQLITE_PATH),
            fresh_on_open: false,
            busy_timeout_ms: 5_000,
        }
    }
}

impl RelationalStoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn fresh(mut self, fresh_on_open: bool) -> Self {
        self.fresh_on_open = fresh_on_open;
        self
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    fn validate(&self) -> StoreResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(invalid("relational store path cannot be empty"));
        }
        if self.busy_timeout_ms == 0 {
            return Err(invalid("busy_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

impl BackendConfig {
    /// Short backend name used in logs and CLI flags.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Document(_) => "document",
            Self::Relational(_) => "relational",
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        match self {
            Self::Document(config) => config.validate(),
            Self::Relational(config) => config.validate(),
        }
    }

    /// Parses a JSON document such as
    /// `{"backend":"relational","path":"/tmp/t.db","fresh_on_open":true}`.
    pub fn from_json_str(raw: &str) -> StoreResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| invalid(&format!("malformed backend config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            invalid(&format!(
                "failed to read config `{}`: {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    /// Builds configuration from `TEXTSTORE_*` environment variables.
    ///
    /// `TEXTSTORE_BACKEND` selects `document` (default) or `relational`.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let backend = lookup(ENV_BACKEND).unwrap_or_else(|| "document".to_string());
        let config = match backend.trim().to_ascii_lowercase().as_str() {
            "document" | "mongo" | "mongodb" => {
                let mut config = DocumentStoreConfig::default();
                if let Some(uri) = lookup(ENV_MONGO_URI) {
                    config.uri = uri;
                }
                Self::Document(config)
            }
            "relational" | "sqlite" => {
                let mut config = RelationalStoreConfig::default();
                if let Some(path) = lookup(ENV_SQLITE_PATH) {
                    config.path = PathBuf::from(path);
                }
                if let Some(flag) = lookup(ENV_SQLITE_FRESH) {
                    config.fresh_on_open = parse_flag(&flag)?;
                }
                Self::Relational(config)
            }
            other => {
                return Err(invalid(&format!(
                    "unsupported backend `{other}`; expected document|relational"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> StoreResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(&format!("invalid boolean flag `{other}`"))),
    }
}

fn invalid(message: &str) -> StoreError {
    StoreError::Connection(format!("invalid configuration: {message}"))
}

#[cfg(test)]
mod tests {
    use super::{
        BackendConfig, DocumentStoreConfig, RelationalStoreConfig, ENV_BACKEND, ENV_SQLITE_FRESH,
        ENV_SQLITE_PATH,
    };
    use crate::backend::error::ErrorKind;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn document_defaults_match_call_bounds() {
        let config = DocumentStoreConfig::default();
        assert_eq!(config.ping_timeout(), Duration::from_secs(5));
        assert_eq!(config.list_collections_timeout(), Duration::from_secs(20));
        assert_eq!(config.point_timeout(), Duration::from_secs(5));
        assert_eq!(config.close_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn relational_fresh_mode_is_opt_in() {
        assert!(!RelationalStoreConfig::default().fresh_on_open);
        assert!(RelationalStoreConfig::at("/tmp/x.db").fresh(true).fresh_on_open);
    }

    #[test]
    fn parses_tagged_json_with_defaults() {
        let config = BackendConfig::from_json_str(
            r#"{"backend":"relational","path":"/tmp/notes.db","fresh_on_open":true}"#,
        )
        .expect("config parses");
        let BackendConfig::Relational(relational) = config else {
            panic!("expected relational config");
        };
        assert_eq!(relational.path, PathBuf::from("/tmp/notes.db"));
        assert!(relational.fresh_on_open);
        assert_eq!(relational.busy_timeout_ms, 5_000);
    }

    #[test]
    fn rejects_zero_timeouts() {
        let err = BackendConfig::from_json_str(r#"{"backend":"document","point_timeout_ms":0}"#)
            .expect_err("zero timeout must be rejected");
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(err.to_string().contains("point_timeout_ms"));
    }

    #[test]
    fn env_lookup_selects_relational_backend() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_BACKEND, "sqlite"),
            (ENV_SQLITE_PATH, "/tmp/env.db"),
            (ENV_SQLITE_FRESH, "yes"),
        ]);
        let config = BackendConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
            .expect("env config parses");
        assert_eq!(
            config,
            BackendConfig::Relational(RelationalStoreConfig::at("/tmp/env.db").fresh(true))
        );
    }

    #[test]
    fn env_lookup_defaults_to_document_backend() {
        let config = BackendConfig::from_lookup(|_| None).expect("defaults parse");
        assert_eq!(config, BackendConfig::Document(DocumentStoreConfig::default()));
        assert_eq!(config.name(), "document");
    }

    #[test]
    fn env_lookup_rejects_unknown_backend() {
        let err = BackendConfig::from_lookup(|key| {
            (key == ENV_BACKEND).then(|| "redis".to_string())
        })
        .expect_err("unknown backend must fail");
        assert!(err.to_string().contains("redis"));
    }
}
