//! Workflow state machine.
//!
//! Any recognized state may be set from any other (operators correct
//! mis-clicks by jumping), with two exceptions checked here: cancelled
//! samples reject every transition, and `rerun_batched` may only be entered
//! from `electro_batched` or later. Every change appends an audit record and
//! bumps the sample's `updated_at`. Setting the state a sample already has is
//! a no-op that still counts as updated.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use labtrack_model::{BatchId, Sample, SampleId, TransitionRecord, WorkflowState};
use labtrack_store::Records;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{LabError, Result};

/// Why a sample was left untouched by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    NotFound,
    Cancelled,
    RerunNotAllowed { current: WorkflowState },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotFound => f.write_str("sample not found"),
            RejectReason::Cancelled => f.write_str("sample is cancelled"),
            RejectReason::RerunNotAllowed { current } => {
                write!(f, "cannot enter rerun_batched from {current}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RejectedSample {
    pub sample_id: SampleId,
    #[serde(flatten)]
    pub reason: RejectReason,
}

/// Result of a multi-sample transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    pub updated_count: usize,
    pub rejected: Vec<RejectedSample>,
}

impl TransitionOutcome {
    pub fn rejected_ids(&self) -> Vec<SampleId> {
        self.rejected.iter().map(|r| r.sample_id).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Checks whether `sample` may move to `target`.
pub fn check_transition(sample: &Sample, target: WorkflowState) -> std::result::Result<(), RejectReason> {
    if sample.is_cancelled() {
        return Err(RejectReason::Cancelled);
    }
    if target == WorkflowState::RerunBatched && !sample.state.allows_rerun() {
        return Err(RejectReason::RerunNotAllowed {
            current: sample.state,
        });
    }
    Ok(())
}

/// Applies `target` to every id, collecting rejections instead of failing.
/// Repeated ids are applied once. Storage failures abort the caller's
/// transaction.
pub(crate) fn apply_transitions(
    records: &mut Records,
    ids: &[SampleId],
    target: WorkflowState,
    at: DateTime<Utc>,
    batch_id: Option<BatchId>,
) -> Result<TransitionOutcome> {
    let mut seen = BTreeSet::new();
    let mut outcome = TransitionOutcome::default();
    for &sample_id in ids {
        if !seen.insert(sample_id) {
            continue;
        }
        let current = match records.sample(sample_id) {
            None => Err(RejectReason::NotFound),
            Some(sample) => check_transition(sample, target).map(|()| sample.state),
        };
        let current = match current {
            Ok(state) => state,
            Err(reason) => {
                warn!(sample_id = %sample_id, to = %target, %reason, "transition rejected");
                outcome.rejected.push(RejectedSample { sample_id, reason });
                continue;
            }
        };
        if current != target {
            records.set_sample_state(sample_id, target, at)?;
            records.record_transition(TransitionRecord {
                sample_id,
                from: current,
                to: target,
                at,
                batch_id,
            })?;
            debug!(sample_id = %sample_id, from = %current, to = %target, "sample transitioned");
        }
        outcome.updated_count += 1;
    }
    Ok(outcome)
}

/// Applies `target` to one sample; any rejection is an error.
pub(crate) fn apply_single(
    records: &mut Records,
    sample_id: SampleId,
    target: WorkflowState,
    at: DateTime<Utc>,
) -> Result<()> {
    let outcome = apply_transitions(records, &[sample_id], target, at, None)?;
    match outcome.rejected.first() {
        None => Ok(()),
        Some(rejected) => Err(rejection_error(rejected)),
    }
}

pub(crate) fn rejection_error(rejected: &RejectedSample) -> LabError {
    match rejected.reason {
        RejectReason::NotFound => LabError::not_found("sample", rejected.sample_id),
        RejectReason::Cancelled => LabError::validation(
            "sample",
            format!("sample {} is cancelled", rejected.sample_id),
        ),
        RejectReason::RerunNotAllowed { current } => LabError::validation(
            "state",
            format!(
                "sample {} cannot enter rerun_batched from {current}",
                rejected.sample_id
            ),
        ),
    }
}
