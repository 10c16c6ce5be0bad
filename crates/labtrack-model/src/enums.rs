//! Closed enumerations for categories, relations, workflow stages and plate
//! well types.
//!
//! The string forms are persisted and matched on by other subsystems, so
//! `as_str` and the serde names must stay exactly as written here.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::ids::LabPrefix;

/// Client category of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientCategory {
    Paternity,
    #[serde(alias = "lt")]
    Legal,
    Urgent,
    PeaceOfMind,
}

impl ClientCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientCategory::Paternity => "paternity",
            ClientCategory::Legal => "legal",
            ClientCategory::Urgent => "urgent",
            ClientCategory::PeaceOfMind => "peace_of_mind",
        }
    }

    /// Lab number prefix for samples of this category.
    pub fn lab_prefix(&self) -> LabPrefix {
        match self {
            ClientCategory::Legal => LabPrefix::Legal,
            _ => LabPrefix::None,
        }
    }
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClientCategory {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "paternity" => Ok(ClientCategory::Paternity),
            "legal" | "lt" => Ok(ClientCategory::Legal),
            "urgent" => Ok(ClientCategory::Urgent),
            "peace_of_mind" | "peace-of-mind" => Ok(ClientCategory::PeaceOfMind),
            _ => Err(ModelError::InvalidCategory(s.to_string())),
        }
    }
}

/// Family relation of a sample donor within its case.
///
/// Anything that is not one of the three canonical relations is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Relation {
    Child,
    AllegedFather,
    Mother,
    Other(String),
}

impl Relation {
    /// Canonical family rank: child, alleged father, mother, everyone else.
    pub fn rank(&self) -> u8 {
        match self {
            Relation::Child => 1,
            Relation::AllegedFather => 2,
            Relation::Mother => 3,
            Relation::Other(_) => 4,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Relation::Child => "Child",
            Relation::AllegedFather => "Alleged Father",
            Relation::Mother => "Mother",
            Relation::Other(other) => other.as_str(),
        }
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ModelError::EmptyRelation);
        }
        let relation = match trimmed.to_ascii_lowercase().as_str() {
            "child" => Relation::Child,
            "alleged father" | "alleged_father" | "father" => Relation::AllegedFather,
            "mother" => Relation::Mother,
            _ => Relation::Other(trimmed.to_string()),
        };
        Ok(relation)
    }

    /// Orders relations by family rank only.
    pub fn family_cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Relation {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Relation> for String {
    fn from(value: Relation) -> Self {
        value.as_str().to_string()
    }
}

/// Processing stage of a sample.
///
/// The first eleven variants form the pipeline in order. `RerunBatched` is a
/// side state entered when a sample is pulled into a rerun batch after
/// electrophoresis batching; it can be entered repeatedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    SampleCollected,
    PcrReady,
    PcrBatched,
    PcrCompleted,
    ElectroReady,
    ElectroBatched,
    ElectroCompleted,
    AnalysisReady,
    AnalysisCompleted,
    ReportReady,
    ReportSent,
    RerunBatched,
}

impl WorkflowState {
    /// The linear pipeline, in processing order.
    pub const PIPELINE: [WorkflowState; 11] = [
        WorkflowState::SampleCollected,
        WorkflowState::PcrReady,
        WorkflowState::PcrBatched,
        WorkflowState::PcrCompleted,
        WorkflowState::ElectroReady,
        WorkflowState::ElectroBatched,
        WorkflowState::ElectroCompleted,
        WorkflowState::AnalysisReady,
        WorkflowState::AnalysisCompleted,
        WorkflowState::ReportReady,
        WorkflowState::ReportSent,
    ];

    /// Every recognized state, pipeline first, then the rerun side state.
    pub const ALL: [WorkflowState; 12] = [
        WorkflowState::SampleCollected,
        WorkflowState::PcrReady,
        WorkflowState::PcrBatched,
        WorkflowState::PcrCompleted,
        WorkflowState::ElectroReady,
        WorkflowState::ElectroBatched,
        WorkflowState::ElectroCompleted,
        WorkflowState::AnalysisReady,
        WorkflowState::AnalysisCompleted,
        WorkflowState::ReportReady,
        WorkflowState::ReportSent,
        WorkflowState::RerunBatched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::SampleCollected => "sample_collected",
            WorkflowState::PcrReady => "pcr_ready",
            WorkflowState::PcrBatched => "pcr_batched",
            WorkflowState::PcrCompleted => "pcr_completed",
            WorkflowState::ElectroReady => "electro_ready",
            WorkflowState::ElectroBatched => "electro_batched",
            WorkflowState::ElectroCompleted => "electro_completed",
            WorkflowState::AnalysisReady => "analysis_ready",
            WorkflowState::AnalysisCompleted => "analysis_completed",
            WorkflowState::ReportReady => "report_ready",
            WorkflowState::ReportSent => "report_sent",
            WorkflowState::RerunBatched => "rerun_batched",
        }
    }

    /// Zero-based position in the pipeline; `None` for the rerun side state.
    pub fn pipeline_index(&self) -> Option<usize> {
        Self::PIPELINE.iter().position(|state| state == self)
    }

    /// Whether a sample in this state may be pulled into a rerun batch.
    pub fn allows_rerun(&self) -> bool {
        match self.pipeline_index() {
            Some(index) => index >= WorkflowState::ElectroBatched as usize,
            None => true,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowState {
    type Err = ModelError;

    /// Exact literal match; anything else is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowState::ALL
            .into_iter()
            .find(|state| state.as_str() == s.trim())
            .ok_or_else(|| ModelError::InvalidState(s.to_string()))
    }
}

/// Content type of a plate well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WellType {
    Sample,
    #[serde(rename = "Allelic Ladder")]
    AllelicLadder,
    #[serde(rename = "Positive Control")]
    PositiveControl,
    #[serde(rename = "Negative Control")]
    NegativeControl,
    Blank,
    #[serde(rename = "empty")]
    Empty,
}

impl WellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WellType::Sample => "Sample",
            WellType::AllelicLadder => "Allelic Ladder",
            WellType::PositiveControl => "Positive Control",
            WellType::NegativeControl => "Negative Control",
            WellType::Blank => "Blank",
            WellType::Empty => "empty",
        }
    }

    pub fn is_control(&self) -> bool {
        ControlType::from_well_type(*self).is_some()
    }
}

impl fmt::Display for WellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WellType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Sample" => Ok(WellType::Sample),
            "Allelic Ladder" => Ok(WellType::AllelicLadder),
            "Positive Control" => Ok(WellType::PositiveControl),
            "Negative Control" => Ok(WellType::NegativeControl),
            "Blank" => Ok(WellType::Blank),
            "empty" => Ok(WellType::Empty),
            _ => Err(ModelError::InvalidWellType(s.to_string())),
        }
    }
}

/// Reference material placed on a plate instead of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    AllelicLadder,
    PositiveControl,
    NegativeControl,
    Blank,
}

impl ControlType {
    pub fn well_type(&self) -> WellType {
        match self {
            ControlType::AllelicLadder => WellType::AllelicLadder,
            ControlType::PositiveControl => WellType::PositiveControl,
            ControlType::NegativeControl => WellType::NegativeControl,
            ControlType::Blank => WellType::Blank,
        }
    }

    pub fn from_well_type(well_type: WellType) -> Option<Self> {
        match well_type {
            WellType::AllelicLadder => Some(ControlType::AllelicLadder),
            WellType::PositiveControl => Some(ControlType::PositiveControl),
            WellType::NegativeControl => Some(ControlType::NegativeControl),
            WellType::Blank => Some(ControlType::Blank),
            WellType::Sample | WellType::Empty => None,
        }
    }

    /// Display label of the control (same text as its well type).
    pub fn label(&self) -> &'static str {
        self.well_type().as_str()
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ControlType {
    type Err = ModelError;

    /// Accepts the well-type label (`Allelic Ladder`) or its snake form
    /// (`allelic_ladder`), plus the short forms `ladder`, `positive`,
    /// `negative` and `blank`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "allelic_ladder" | "ladder" => Ok(ControlType::AllelicLadder),
            "positive_control" | "positive" => Ok(ControlType::PositiveControl),
            "negative_control" | "negative" => Ok(ControlType::NegativeControl),
            "blank" => Ok(ControlType::Blank),
            _ => Err(ModelError::InvalidControlType(s.to_string())),
        }
    }
}

/// Kind of plate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Pcr,
    Electrophoresis,
    Rerun,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Pcr => "pcr",
            BatchKind::Electrophoresis => "electrophoresis",
            BatchKind::Rerun => "rerun",
        }
    }

    /// Stage every sample enters when a batch of this kind is committed.
    pub fn batched_state(&self) -> WorkflowState {
        match self {
            BatchKind::Pcr => WorkflowState::PcrBatched,
            BatchKind::Electrophoresis => WorkflowState::ElectroBatched,
            BatchKind::Rerun => WorkflowState::RerunBatched,
        }
    }

    /// Stage samples reach when a batch of this kind is completed.
    pub fn completed_state(&self) -> WorkflowState {
        match self {
            BatchKind::Pcr => WorkflowState::PcrCompleted,
            BatchKind::Electrophoresis | BatchKind::Rerun => WorkflowState::ElectroCompleted,
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pcr" => Ok(BatchKind::Pcr),
            "electrophoresis" | "electro" => Ok(BatchKind::Electrophoresis),
            "rerun" => Ok(BatchKind::Rerun),
            _ => Err(ModelError::InvalidBatchKind(s.to_string())),
        }
    }
}

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
            Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(ModelError::InvalidStatus {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

status_enum!(
    /// Lifecycle of a batch record.
    BatchStatus, "batch_status", { Active => "active", Completed => "completed" }
);

status_enum!(
    /// Whether a sample is still being processed. Cancelled samples are kept.
    SampleStatus, "sample_status", { Active => "active", Cancelled => "cancelled" }
);

status_enum!(
    /// Administrative status of a case.
    CaseStatus, "case_status", {
        Active => "active",
        OnHold => "on_hold",
        Completed => "completed",
        Cancelled => "cancelled",
    }
);
