//! Batch aggregate: committing an allocated plate and completing it.
//!
//! A commit persists the batch, one well assignment per non-empty well, the
//! placement on each sample, and the move of every placed sample to the
//! batch kind's batched stage. It runs inside one store transaction, so a
//! failure at any step (a duplicate batch number, a cancelled sample) leaves
//! no trace.

use chrono::{DateTime, NaiveDate, Utc};
use labtrack_model::{
    Batch, BatchKind, BatchNumber, BatchStatus, PlateGeometry, SampleId, WellAssignment, WellMap,
    WellType,
};
use labtrack_store::Records;
use serde::Serialize;

use crate::error::{LabError, Result};
use crate::workflow::{self, RejectedSample};

/// Operator-supplied batch details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchMeta {
    pub batch_number: BatchNumber,
    pub kind: BatchKind,
    pub operator: String,
    pub pcr_date: Option<NaiveDate>,
    pub electro_date: Option<NaiveDate>,
    pub settings: String,
}

impl BatchMeta {
    pub fn new(batch_number: BatchNumber, kind: BatchKind, operator: impl Into<String>) -> Self {
        Self {
            batch_number,
            kind,
            operator: operator.into(),
            pcr_date: None,
            electro_date: None,
            settings: String::new(),
        }
    }

    /// Rerun batches, and only rerun batches, carry the `_RR` suffix.
    pub fn validate(&self) -> Result<()> {
        if self.operator.trim().is_empty() {
            return Err(LabError::validation("operator", "operator must not be empty"));
        }
        let rerun_name = self.batch_number.is_rerun();
        let rerun_kind = self.kind == BatchKind::Rerun;
        if rerun_name != rerun_kind {
            return Err(LabError::validation(
                "batch_number",
                format!(
                    "{} does not match batch kind {}",
                    self.batch_number, self.kind
                ),
            ));
        }
        Ok(())
    }
}

/// Batch plus its persisted well assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDetail {
    pub batch: Batch,
    pub wells: Vec<WellAssignment>,
}

/// Outcome of completing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchCompletion {
    pub batch: Batch,
    /// Samples moved to the kind's completed stage.
    pub advanced: usize,
}

/// Checks a well map received from a caller against the configured plate.
pub fn validate_well_map(map: &WellMap, geometry: PlateGeometry) -> Result<()> {
    if map.geometry != geometry {
        return Err(LabError::validation(
            "well_map",
            format!(
                "plate is {}x{}, expected {}x{}",
                map.geometry.rows(),
                map.geometry.columns(),
                geometry.rows(),
                geometry.columns()
            ),
        ));
    }
    map.validate()?;
    Ok(())
}

/// Persists `meta` and `map` as a new batch. Must run inside a transaction.
pub(crate) fn commit(
    records: &mut Records,
    meta: &BatchMeta,
    map: &WellMap,
    at: DateTime<Utc>,
) -> Result<Batch> {
    let batch_id = records.next_batch_id();
    let target = meta.kind.batched_state();
    let sample_ids = map.sample_ids();

    for &sample_id in &sample_ids {
        let sample = records
            .sample(sample_id)
            .ok_or_else(|| LabError::not_found("sample", sample_id))?;
        if let Err(reason) = workflow::check_transition(sample, target) {
            return Err(workflow::rejection_error(&RejectedSample { sample_id, reason }));
        }
    }

    let wells: Vec<WellAssignment> = map
        .occupied()
        .map(|well| WellAssignment {
            batch_id,
            position: well.position,
            well_type: well.well_type,
            sample_id: well.sample_id,
            label: well.label.clone(),
            comment: well.comment.clone(),
        })
        .collect();
    let batch = Batch {
        id: batch_id,
        batch_number: meta.batch_number.clone(),
        kind: meta.kind,
        operator: meta.operator.trim().to_string(),
        pcr_date: meta.pcr_date,
        electro_date: meta.electro_date,
        settings: meta.settings.clone(),
        total_samples: map.sample_count(),
        status: BatchStatus::Active,
        created_at: at,
        completed_at: None,
    };
    records.insert_batch(batch.clone(), wells)?;

    for well in map.sample_wells() {
        if let Some(sample_id) = well.sample_id {
            records.place_sample(sample_id, batch_id, well.position, at)?;
        }
    }
    let outcome = workflow::apply_transitions(records, &sample_ids, target, at, Some(batch_id))?;
    if let Some(rejected) = outcome.rejected.first() {
        return Err(workflow::rejection_error(rejected));
    }
    Ok(batch)
}

/// Marks a batch completed and advances the samples still waiting in its
/// batched stage. Must run inside a transaction.
pub(crate) fn complete(
    records: &mut Records,
    batch_number: &BatchNumber,
    at: DateTime<Utc>,
) -> Result<BatchCompletion> {
    let batch = records
        .batch_by_number(batch_number)
        .ok_or_else(|| LabError::not_found("batch", batch_number))?;
    if batch.status == BatchStatus::Completed {
        return Err(LabError::AlreadyClosed {
            entity: "batch",
            key: batch_number.to_string(),
            status: BatchStatus::Completed.as_str(),
        });
    }
    let batch_id = batch.id;
    let kind = batch.kind;
    let waiting: Vec<SampleId> = records
        .wells_for_batch(batch_id)
        .iter()
        .filter(|well| well.well_type == WellType::Sample)
        .filter_map(|well| well.sample_id)
        .filter(|&id| {
            records
                .sample(id)
                .is_some_and(|s| !s.is_cancelled() && s.state == kind.batched_state())
        })
        .collect();
    let outcome =
        workflow::apply_transitions(records, &waiting, kind.completed_state(), at, Some(batch_id))?;
    let batch = records.complete_batch(batch_id, at)?.clone();
    Ok(BatchCompletion {
        batch,
        advanced: outcome.updated_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rerun_suffix_must_match_kind() {
        let rerun_name = BatchNumber::new("ELE_0412_RR").unwrap();
        let plain_name = BatchNumber::new("PCR_0412").unwrap();
        assert!(BatchMeta::new(rerun_name.clone(), BatchKind::Rerun, "JS").validate().is_ok());
        assert!(BatchMeta::new(rerun_name, BatchKind::Electrophoresis, "JS").validate().is_err());
        assert!(BatchMeta::new(plain_name.clone(), BatchKind::Rerun, "JS").validate().is_err());
        let err = BatchMeta::new(plain_name, BatchKind::Pcr, "  ").validate().unwrap_err();
        assert!(matches!(err, LabError::Validation { field: "operator", .. }));
    }

    #[test]
    fn well_map_geometry_must_match_configuration() {
        let small = PlateGeometry::new(2, 2).unwrap();
        let map = WellMap::empty(small);
        assert!(validate_well_map(&map, small).is_ok());
        assert!(validate_well_map(&map, PlateGeometry::STANDARD_96).is_err());

        let mut truncated = WellMap::empty(small);
        truncated.wells.pop();
        assert_eq!(
            validate_well_map(&truncated, small).unwrap_err().kind(),
            crate::ErrorKind::Validation
        );
    }
}
