//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key is already taken.
    #[error("{entity} {key} already exists")]
    Conflict { entity: &'static str, key: String },

    /// A record refers to something that is not stored.
    #[error("{entity} {key} not found")]
    MissingReference { entity: &'static str, key: String },

    /// File I/O error.
    #[error("failed to {operation} store file {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a store file.
    #[error("invalid store file {path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    /// The file was written by a newer schema.
    #[error("store file version {found} is not supported (maximum: {max_supported})")]
    UnsupportedVersion { found: u32, max_supported: u32 },

    /// Payload does not match the recorded checksum.
    #[error("store file {path} is corrupted (expected sha256 {expected}, got {actual})")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Loaded records break a store invariant.
    #[error("store data is inconsistent: {0}")]
    Corrupt(String),

    #[error("failed to serialize store data")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize store data")]
    Deserialization {
        #[source]
        source: serde_json::Error,
    },

    /// Temp file could not be renamed over the store file.
    #[error("failed to complete write of {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub(crate) fn conflict(entity: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn missing(entity: &'static str, key: impl ToString) -> Self {
        Self::MissingReference {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
