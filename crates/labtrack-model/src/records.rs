use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    BatchKind, BatchStatus, CaseStatus, ClientCategory, Relation, SampleStatus, WellType,
    WorkflowState,
};
use crate::ids::{BatchId, BatchNumber, CaseId, CaseNumber, LabNumber, SampleId};
use crate::plate::WellPosition;

/// One family submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub case_number: CaseNumber,
    pub category: ClientCategory,
    pub submitted_on: NaiveDate,
    pub mother_present: bool,
    #[serde(default)]
    pub status: CaseStatus,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One biological specimen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub lab_number: LabNumber,
    pub case_id: CaseId,
    pub relation: Relation,
    /// Donor name. Personal data; never log it unredacted.
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub collected_on: Option<NaiveDate>,
    pub state: WorkflowState,
    #[serde(default)]
    pub status: SampleStatus,
    /// Most recent batch the sample was placed in.
    #[serde(default)]
    pub batch_id: Option<BatchId>,
    #[serde(default)]
    pub well_position: Option<WellPosition>,
    #[serde(default)]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sample {
    pub fn is_cancelled(&self) -> bool {
        self.status == SampleStatus::Cancelled
    }

    /// Canonical family sort key: relation rank, then lab number sequence.
    pub fn family_key(&self) -> (u8, u32) {
        (self.relation.rank(), self.lab_number.sequence())
    }
}

/// One plate-processing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub batch_number: BatchNumber,
    pub kind: BatchKind,
    pub operator: String,
    #[serde(default)]
    pub pcr_date: Option<NaiveDate>,
    #[serde(default)]
    pub electro_date: Option<NaiveDate>,
    #[serde(default)]
    pub settings: String,
    /// Number of wells of type `Sample`.
    pub total_samples: usize,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A persisted, non-empty well of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellAssignment {
    pub batch_id: BatchId,
    pub position: WellPosition,
    pub well_type: WellType,
    pub sample_id: Option<SampleId>,
    pub label: String,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Audit entry for one applied state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub sample_id: SampleId,
    pub from: WorkflowState,
    pub to: WorkflowState,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub batch_id: Option<BatchId>,
}
