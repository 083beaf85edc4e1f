use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Bad category configuration. Aborts the owning category, never the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    #[error("category {0} must list `id` as its first field")]
    MissingIdField(String),
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("category {category} lists field {field} twice")]
    DuplicateField { category: String, field: String },
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed category config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("settings: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Failures reported by a render host.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },
    #[error("render script failed: {0}")]
    Script(String),
    #[error("malformed render output: {0}")]
    Parse(String),
    #[error("render host closed: {0}")]
    Closed(String),
}

impl RenderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            RenderError::Timeout { .. } | RenderError::Script(_) | RenderError::Parse(_) => true,
            RenderError::Closed(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("could not prepare upsert into {table}: {source}")]
    Prepare {
        table: String,
        source: rusqlite::Error,
    },
    #[error("upsert into {table} failed for id {id}: {source}")]
    Exec {
        table: String,
        id: String,
        source: rusqlite::Error,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("could not prepare {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Capture(#[from] RenderError),
}

/// Anything that stops a whole category (but only that category).
#[derive(Debug, Error)]
pub enum CategoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{category} data never became ready: {source}")]
    NotReady {
        category: String,
        source: RenderError,
    },
    #[error("{op} failed for {category}: {source}")]
    Host {
        category: String,
        op: &'static str,
        source: RenderError,
    },
}
