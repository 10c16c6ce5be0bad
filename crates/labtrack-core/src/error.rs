//! Core error type.
//!
//! Every error carries a machine-readable [`ErrorKind`] plus a readable
//! message. Callers map kinds to their own status codes.

use std::fmt;

use labtrack_model::ModelError;
use labtrack_store::StoreError;
use thiserror::Error;

/// Machine-readable error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input shape; rejected before touching storage.
    Validation,
    /// Unique-key collision or occupied well; the operation rolled back and
    /// may be retried.
    Conflict,
    /// More samples than free wells.
    Capacity,
    /// A referenced record does not exist.
    NotFound,
    /// The storage collaborator failed.
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Capacity => "capacity",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LabError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("{entity} {key} already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("well {position} is already occupied")]
    WellOccupied { position: String },

    #[error("{entity} {key} is already {status}")]
    AlreadyClosed {
        entity: &'static str,
        key: String,
        status: &'static str,
    },

    #[error("plate capacity exceeded: {requested} samples requested, {available} wells available")]
    Capacity { requested: usize, available: usize },

    #[error(
        "family group of {size} anchored at {anchor} does not fit: only {available} free wells remain"
    )]
    GroupDoesNotFit {
        anchor: String,
        size: usize,
        available: usize,
    },

    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },

    #[error("case sequence for {year} is exhausted")]
    SequenceExhausted { year: i32 },

    #[error(transparent)]
    Store(StoreError),
}

impl LabError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LabError::Validation { .. } => ErrorKind::Validation,
            LabError::Conflict { .. }
            | LabError::WellOccupied { .. }
            | LabError::AlreadyClosed { .. } => ErrorKind::Conflict,
            LabError::Capacity { .. }
            | LabError::GroupDoesNotFit { .. }
            | LabError::SequenceExhausted { .. } => ErrorKind::Capacity,
            LabError::NotFound { .. } => ErrorKind::NotFound,
            LabError::Store(_) => ErrorKind::Storage,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        LabError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        LabError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl ToString) -> Self {
        LabError::Conflict {
            entity,
            key: key.to_string(),
        }
    }
}

impl From<ModelError> for LabError {
    fn from(error: ModelError) -> Self {
        LabError::Validation {
            field: error.field(),
            message: error.to_string(),
        }
    }
}

impl From<StoreError> for LabError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { entity, key } => LabError::Conflict { entity, key },
            StoreError::MissingReference { entity, key } => LabError::NotFound { entity, key },
            other => LabError::Store(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, LabError>;
