//! Error type shared by the storage core.

use std::path::PathBuf;

/// Errors raised by the record store, registries, index and object cache.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record, thumbnail or cached object does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A collection item with this id is not present in its collection file.
    #[error("item not found: {0}")]
    ItemNotFound(i64),

    /// A single persisted file could not be parsed.
    #[error("corrupt file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The target of an update or delete vanished concurrently.
    #[error("conflict on {0}")]
    Conflict(String),

    /// An upload is larger than the configured cap.
    #[error("upload exceeds size limit ({actual} > {limit} bytes)")]
    ResourceExceeded { actual: u64, limit: u64 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload is not a decodable image or the key shape has no loader.
    #[error("unsupported media: {0}")]
    Unsupported(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ItemNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
