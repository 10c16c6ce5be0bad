//! Data model for the DNA lab tracker: cases, samples, batches and plates.

pub mod enums;
pub mod error;
pub mod ids;
pub mod plate;
pub mod records;

pub use enums::{
    BatchKind, BatchStatus, CaseStatus, ClientCategory, ControlType, Relation, SampleStatus,
    WellType, WorkflowState,
};
pub use error::{ModelError, Result};
pub use ids::{
    BatchId, BatchNumber, CaseId, CaseNumber, LabNumber, LabPrefix, RERUN_SUFFIX, SampleId,
};
pub use plate::{PlateGeometry, Well, WellMap, WellPosition};
pub use records::{Batch, Case, Sample, TransitionRecord, WellAssignment};
