use thiserror::Error;

/// Shape errors raised while parsing or validating model values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid lab number '{0}' (expected [LT]yy_seq)")]
    InvalidLabNumber(String),
    #[error("invalid case number '{0}' (expected CASE_yyyy_nnn)")]
    InvalidCaseNumber(String),
    #[error("invalid batch number '{0}'")]
    InvalidBatchNumber(String),
    #[error("invalid well position '{0}'")]
    InvalidWellPosition(String),
    #[error("unknown workflow state '{0}'")]
    InvalidState(String),
    #[error("unknown client category '{0}'")]
    InvalidCategory(String),
    #[error("relation must not be empty")]
    EmptyRelation,
    #[error("unknown well type '{0}'")]
    InvalidWellType(String),
    #[error("unknown control type '{0}'")]
    InvalidControlType(String),
    #[error("unknown batch kind '{0}'")]
    InvalidBatchKind(String),
    #[error("unknown {field} '{value}'")]
    InvalidStatus { field: &'static str, value: String },
    #[error("invalid plate geometry {rows}x{columns} (rows 1-26, columns 1-99)")]
    InvalidGeometry { rows: u8, columns: u8 },
    #[error("well {position} is outside a {rows}x{columns} plate")]
    WellOutsidePlate {
        position: String,
        rows: u8,
        columns: u8,
    },
    #[error("well {0} appears more than once")]
    DuplicateWell(String),
    #[error("sample {sample_id} occupies more than one well")]
    DuplicateSample { sample_id: u64 },
    #[error("well map has {found} wells but the plate has {expected}")]
    IncompleteWellMap { expected: usize, found: usize },
    #[error("well {position}: {reason}")]
    InconsistentWell { position: String, reason: String },
}

impl ModelError {
    /// Name of the input field at fault.
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidLabNumber(_) => "lab_number",
            Self::InvalidCaseNumber(_) => "case_number",
            Self::InvalidBatchNumber(_) => "batch_number",
            Self::InvalidWellPosition(_) | Self::WellOutsidePlate { .. } => "well_position",
            Self::InvalidState(_) => "state",
            Self::InvalidCategory(_) => "category",
            Self::EmptyRelation => "relation",
            Self::InvalidWellType(_) => "well_type",
            Self::InvalidControlType(_) => "control",
            Self::InvalidBatchKind(_) => "batch_kind",
            Self::InvalidStatus { field, .. } => *field,
            Self::InvalidGeometry { .. } => "geometry",
            Self::DuplicateWell(_)
            | Self::DuplicateSample { .. }
            | Self::IncompleteWellMap { .. }
            | Self::InconsistentWell { .. } => "well_map",
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
