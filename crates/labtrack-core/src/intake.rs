//! Case and sample intake.
//!
//! Numbers are sequenced inside the caller's transaction, immediately
//! before the insert that consumes them.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use labtrack_model::{
    Case, CaseId, CaseStatus, ClientCategory, LabNumber, Relation, Sample, SampleStatus,
    WorkflowState,
};
use labtrack_store::Records;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LabError, Result};
use crate::family;
use crate::redact::redact_value;
use crate::sequencer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
    pub category: ClientCategory,
    pub submitted_on: NaiveDate,
    pub mother_present: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSample {
    pub case_id: CaseId,
    pub relation: Relation,
    /// Number obtained from the sequencer beforehand; allocated on insert
    /// when absent.
    #[serde(default)]
    pub lab_number: Option<LabNumber>,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub collected_on: Option<NaiveDate>,
}

/// One family member registered together with its case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub relation: Relation,
    #[serde(default)]
    pub donor_name: Option<String>,
    #[serde(default)]
    pub collected_on: Option<NaiveDate>,
}

impl NewMember {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            donor_name: None,
            collected_on: None,
        }
    }
}

/// A case with the samples registered alongside it, in family order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub case: Case,
    pub samples: Vec<Sample>,
}

pub(crate) fn create_case(records: &mut Records, data: &NewCase, at: DateTime<Utc>) -> Result<Case> {
    let case_number = sequencer::next_case_number(records, at.year())?;
    let case = Case {
        id: records.next_case_id(),
        case_number,
        category: data.category,
        submitted_on: data.submitted_on,
        mother_present: data.mother_present,
        status: CaseStatus::Active,
        comment: normalize(data.comment.as_deref()),
        created_at: at,
        updated_at: at,
    };
    records.insert_case(case.clone())?;
    Ok(case)
}

pub(crate) fn create_sample(
    records: &mut Records,
    data: &NewSample,
    at: DateTime<Utc>,
) -> Result<Sample> {
    let case = records
        .case(data.case_id)
        .ok_or_else(|| LabError::not_found("case", data.case_id))?;
    let category = case.category;
    let lab_number = match &data.lab_number {
        Some(number) => {
            if number.prefix() != category.lab_prefix() {
                return Err(LabError::validation(
                    "lab_number",
                    format!("{number} does not carry the prefix for {category} cases"),
                ));
            }
            *number
        }
        None => first(sequencer::next_lab_numbers(records, category, 1, at.year())?)?,
    };
    insert_sample(
        records,
        data.case_id,
        lab_number,
        &data.relation,
        data.donor_name.as_deref(),
        data.collected_on,
        at,
    )
}

/// Creates a case and all its samples, numbering the samples in canonical
/// family order.
pub(crate) fn register_case(
    records: &mut Records,
    data: &NewCase,
    members: &[NewMember],
    at: DateTime<Utc>,
) -> Result<Registration> {
    let case = create_case(records, data, at)?;
    if members.is_empty() {
        return Ok(Registration {
            case,
            samples: Vec::new(),
        });
    }
    let mut ordered: Vec<&NewMember> = members.iter().collect();
    family::sort_for_intake(&mut ordered, |member| &member.relation);
    let numbers = sequencer::next_lab_numbers(records, case.category, ordered.len(), at.year())?;
    let mut samples = Vec::with_capacity(ordered.len());
    for (member, lab_number) in ordered.into_iter().zip(numbers) {
        samples.push(insert_sample(
            records,
            case.id,
            lab_number,
            &member.relation,
            member.donor_name.as_deref(),
            member.collected_on,
            at,
        )?);
    }
    Ok(Registration { case, samples })
}

fn insert_sample(
    records: &mut Records,
    case_id: CaseId,
    lab_number: LabNumber,
    relation: &Relation,
    donor_name: Option<&str>,
    collected_on: Option<NaiveDate>,
    at: DateTime<Utc>,
) -> Result<Sample> {
    let donor_name = normalize(donor_name);
    debug!(
        lab_number = %lab_number,
        relation = %relation,
        donor = donor_name.as_deref().map_or("", redact_value),
        "sample intake"
    );
    let sample = Sample {
        id: records.next_sample_id(),
        lab_number,
        case_id,
        relation: relation.clone(),
        donor_name,
        collected_on,
        state: WorkflowState::SampleCollected,
        status: SampleStatus::Active,
        batch_id: None,
        well_position: None,
        cancel_reason: None,
        created_at: at,
        updated_at: at,
    };
    records.insert_sample(sample.clone())?;
    Ok(sample)
}

fn first(numbers: Vec<LabNumber>) -> Result<LabNumber> {
    numbers
        .into_iter()
        .next()
        .ok_or_else(|| LabError::validation("count", "no lab number was allocated"))
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
