//! The record set held by a store, with its unique-key indices.
//!
//! Every write goes through a method here so the indices cannot drift from the
//! records. Unique keys: case number, lab number, batch number; within one
//! batch, well position and sample id.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labtrack_model::{
    Batch, BatchId, BatchNumber, BatchStatus, Case, CaseId, CaseNumber, CaseStatus, LabNumber,
    Sample, SampleId, SampleStatus, TransitionRecord, WellAssignment, WellPosition, WorkflowState,
};

use crate::error::{Result, StoreError};

/// Serializable form of [`Records`]; indices are rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub cases: Vec<Case>,
    pub samples: Vec<Sample>,
    pub batches: Vec<Batch>,
    pub wells: Vec<WellAssignment>,
    pub transitions: Vec<TransitionRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct Records {
    cases: BTreeMap<CaseId, Case>,
    samples: BTreeMap<SampleId, Sample>,
    batches: BTreeMap<BatchId, Batch>,
    wells: BTreeMap<BatchId, Vec<WellAssignment>>,
    transitions: Vec<TransitionRecord>,
    case_numbers: BTreeMap<String, CaseId>,
    lab_numbers: BTreeMap<String, SampleId>,
    batch_numbers: BTreeMap<String, BatchId>,
}

impl Records {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds records from a snapshot, re-checking every unique key.
    pub fn from_snapshot(snapshot: RecordSnapshot) -> Result<Self> {
        let mut records = Self::new();
        let corrupt = |error: StoreError| StoreError::Corrupt(error.to_string());
        for case in snapshot.cases {
            records.insert_case(case).map_err(corrupt)?;
        }
        for sample in snapshot.samples {
            records.insert_sample(sample).map_err(corrupt)?;
        }
        let mut wells_by_batch: BTreeMap<BatchId, Vec<WellAssignment>> = BTreeMap::new();
        for well in snapshot.wells {
            wells_by_batch.entry(well.batch_id).or_default().push(well);
        }
        for batch in snapshot.batches {
            let wells = wells_by_batch.remove(&batch.id).unwrap_or_default();
            records.insert_batch(batch, wells).map_err(corrupt)?;
        }
        if let Some(batch_id) = wells_by_batch.keys().next() {
            return Err(StoreError::Corrupt(format!(
                "wells reference unknown batch {batch_id}"
            )));
        }
        for transition in &snapshot.transitions {
            if !records.samples.contains_key(&transition.sample_id) {
                return Err(StoreError::Corrupt(format!(
                    "transition references unknown sample {}",
                    transition.sample_id
                )));
            }
        }
        records.transitions = snapshot.transitions;
        Ok(records)
    }

    pub fn to_snapshot(&self) -> RecordSnapshot {
        RecordSnapshot {
            cases: self.cases.values().cloned().collect(),
            samples: self.samples.values().cloned().collect(),
            batches: self.batches.values().cloned().collect(),
            wells: self.wells.values().flatten().cloned().collect(),
            transitions: self.transitions.clone(),
        }
    }

    // ---------------------------------------------------------------------
    // Cases
    // ---------------------------------------------------------------------

    pub fn next_case_id(&self) -> CaseId {
        self.cases
            .last_key_value()
            .map_or(CaseId(1), |(id, _)| id.next())
    }

    pub fn insert_case(&mut self, case: Case) -> Result<CaseId> {
        if self.cases.contains_key(&case.id) {
            return Err(StoreError::conflict("case id", case.id));
        }
        let key = case.case_number.to_string();
        if self.case_numbers.contains_key(&key) {
            return Err(StoreError::conflict("case number", key));
        }
        let id = case.id;
        self.case_numbers.insert(key, id);
        self.cases.insert(id, case);
        Ok(id)
    }

    /// Updates the two mutable case fields.
    pub fn update_case(
        &mut self,
        id: CaseId,
        status: CaseStatus,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<&Case> {
        let case = self
            .cases
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing("case", id))?;
        case.status = status;
        case.comment = comment;
        case.updated_at = at;
        Ok(case)
    }

    pub fn case(&self, id: CaseId) -> Option<&Case> {
        self.cases.get(&id)
    }

    pub fn case_by_number(&self, number: &CaseNumber) -> Option<&Case> {
        self.case_numbers
            .get(&number.to_string())
            .and_then(|id| self.cases.get(id))
    }

    pub fn cases(&self) -> impl Iterator<Item = &Case> {
        self.cases.values()
    }

    /// Case numbers starting with `prefix`, e.g. `CASE_2025_`.
    pub fn case_numbers_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        prefix_scan(&self.case_numbers, prefix)
    }

    // ---------------------------------------------------------------------
    // Samples
    // ---------------------------------------------------------------------

    pub fn next_sample_id(&self) -> SampleId {
        self.samples
            .last_key_value()
            .map_or(SampleId(1), |(id, _)| id.next())
    }

    pub fn insert_sample(&mut self, sample: Sample) -> Result<SampleId> {
        if !self.cases.contains_key(&sample.case_id) {
            return Err(StoreError::missing("case", sample.case_id));
        }
        if self.samples.contains_key(&sample.id) {
            return Err(StoreError::conflict("sample id", sample.id));
        }
        let key = sample.lab_number.to_string();
        if self.lab_numbers.contains_key(&key) {
            return Err(StoreError::conflict("lab number", key));
        }
        let id = sample.id;
        self.lab_numbers.insert(key, id);
        self.samples.insert(id, sample);
        Ok(id)
    }

    pub fn sample(&self, id: SampleId) -> Option<&Sample> {
        self.samples.get(&id)
    }

    pub fn sample_by_lab_number(&self, number: &LabNumber) -> Option<&Sample> {
        self.lab_numbers
            .get(&number.to_string())
            .and_then(|id| self.samples.get(id))
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn samples_for_case(&self, case_id: CaseId) -> Vec<&Sample> {
        self.samples
            .values()
            .filter(|sample| sample.case_id == case_id)
            .collect()
    }

    /// Lab numbers starting with `prefix`, e.g. `LT25_`.
    pub fn lab_numbers_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        prefix_scan(&self.lab_numbers, prefix)
    }

    /// Sets a sample's stage and returns the previous one.
    pub fn set_sample_state(
        &mut self,
        id: SampleId,
        state: WorkflowState,
        at: DateTime<Utc>,
    ) -> Result<WorkflowState> {
        let sample = self.sample_entry(id)?;
        let previous = sample.state;
        sample.state = state;
        sample.updated_at = at;
        Ok(previous)
    }

    /// Records the batch and well a sample was most recently placed in.
    pub fn place_sample(
        &mut self,
        id: SampleId,
        batch_id: BatchId,
        position: WellPosition,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let sample = self.sample_entry(id)?;
        sample.batch_id = Some(batch_id);
        sample.well_position = Some(position);
        sample.updated_at = at;
        Ok(())
    }

    pub fn cancel_sample(
        &mut self,
        id: SampleId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<&Sample> {
        let sample = self.sample_entry(id)?;
        sample.status = SampleStatus::Cancelled;
        sample.cancel_reason = reason;
        sample.updated_at = at;
        Ok(sample)
    }

    fn sample_entry(&mut self, id: SampleId) -> Result<&mut Sample> {
        self.samples
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing("sample", id))
    }

    // ---------------------------------------------------------------------
    // Batches and wells
    // ---------------------------------------------------------------------

    pub fn next_batch_id(&self) -> BatchId {
        self.batches
            .last_key_value()
            .map_or(BatchId(1), |(id, _)| id.next())
    }

    /// Inserts a batch together with its wells. Wells are written once here
    /// and never modified afterwards.
    pub fn insert_batch(&mut self, batch: Batch, wells: Vec<WellAssignment>) -> Result<BatchId> {
        if self.batches.contains_key(&batch.id) {
            return Err(StoreError::conflict("batch id", batch.id));
        }
        let key = batch.batch_number.to_string();
        if self.batch_numbers.contains_key(&key) {
            return Err(StoreError::conflict("batch number", key));
        }
        let mut positions = BTreeSet::new();
        let mut sample_ids = BTreeSet::new();
        for well in &wells {
            if well.batch_id != batch.id {
                return Err(StoreError::Corrupt(format!(
                    "well {} belongs to batch {}, not {}",
                    well.position, well.batch_id, batch.id
                )));
            }
            if !positions.insert(well.position.to_string()) {
                return Err(StoreError::conflict(
                    "well",
                    format!("{} in batch {}", well.position, batch.batch_number),
                ));
            }
            if let Some(sample_id) = well.sample_id {
                if !self.samples.contains_key(&sample_id) {
                    return Err(StoreError::missing("sample", sample_id));
                }
                if !sample_ids.insert(sample_id) {
                    return Err(StoreError::conflict(
                        "sample placement",
                        format!("{sample_id} in batch {}", batch.batch_number),
                    ));
                }
            }
        }
        let id = batch.id;
        self.batch_numbers.insert(key, id);
        self.batches.insert(id, batch);
        self.wells.insert(id, wells);
        Ok(id)
    }

    pub fn complete_batch(&mut self, id: BatchId, at: DateTime<Utc>) -> Result<&Batch> {
        let batch = self
            .batches
            .get_mut(&id)
            .ok_or_else(|| StoreError::missing("batch", id))?;
        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(at);
        Ok(batch)
    }

    pub fn batch(&self, id: BatchId) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub fn batch_by_number(&self, number: &BatchNumber) -> Option<&Batch> {
        self.batch_numbers
            .get(number.as_str())
            .and_then(|id| self.batches.get(id))
    }

    pub fn batches(&self) -> impl Iterator<Item = &Batch> {
        self.batches.values()
    }

    pub fn wells_for_batch(&self, id: BatchId) -> &[WellAssignment] {
        self.wells.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---------------------------------------------------------------------
    // Audit trail
    // ---------------------------------------------------------------------

    pub fn record_transition(&mut self, record: TransitionRecord) -> Result<()> {
        if !self.samples.contains_key(&record.sample_id) {
            return Err(StoreError::missing("sample", record.sample_id));
        }
        self.transitions.push(record);
        Ok(())
    }

    pub fn transitions_for(&self, sample_id: SampleId) -> Vec<&TransitionRecord> {
        self.transitions
            .iter()
            .filter(|record| record.sample_id == sample_id)
            .collect()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }
}

fn prefix_scan<'a, V>(
    index: &'a BTreeMap<String, V>,
    prefix: &'a str,
) -> impl Iterator<Item = &'a str> {
    index
        .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
        .map(|(key, _)| key.as_str())
        .take_while(move |key| key.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use labtrack_model::{BatchKind, ClientCategory, Relation, WellType};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap()
    }

    fn case(id: u64, number: &str) -> Case {
        Case {
            id: CaseId(id),
            case_number: CaseNumber::parse(number).unwrap(),
            category: ClientCategory::Paternity,
            submitted_on: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            mother_present: true,
            status: CaseStatus::Active,
            comment: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn sample(id: u64, case_id: u64, lab: &str) -> Sample {
        Sample {
            id: SampleId(id),
            lab_number: LabNumber::parse(lab).unwrap(),
            case_id: CaseId(case_id),
            relation: Relation::Child,
            donor_name: None,
            collected_on: None,
            state: WorkflowState::SampleCollected,
            status: SampleStatus::Active,
            batch_id: None,
            well_position: None,
            cancel_reason: None,
            created_at: at(),
            updated_at: at(),
        }
    }

    fn batch(id: u64, number: &str) -> Batch {
        Batch {
            id: BatchId(id),
            batch_number: BatchNumber::new(number).unwrap(),
            kind: BatchKind::Pcr,
            operator: "JS".to_string(),
            pcr_date: None,
            electro_date: None,
            settings: String::new(),
            total_samples: 1,
            status: BatchStatus::Active,
            created_at: at(),
            completed_at: None,
        }
    }

    fn well(batch_id: u64, position: &str, sample_id: Option<u64>) -> WellAssignment {
        WellAssignment {
            batch_id: BatchId(batch_id),
            position: WellPosition::parse(position).unwrap(),
            well_type: if sample_id.is_some() {
                WellType::Sample
            } else {
                WellType::AllelicLadder
            },
            sample_id: sample_id.map(SampleId),
            label: String::new(),
            comment: None,
        }
    }

    #[test]
    fn lab_number_index_rejects_duplicates() {
        let mut records = Records::new();
        records.insert_case(case(1, "CASE_2025_001")).unwrap();
        records.insert_sample(sample(1, 1, "25_1")).unwrap();
        let err = records.insert_sample(sample(2, 1, "25_1")).unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "lab number", .. }));
        let err = records.insert_sample(sample(3, 9, "25_3")).unwrap_err();
        assert!(matches!(err, StoreError::MissingReference { entity: "case", .. }));
    }

    #[test]
    fn prefix_scan_stays_inside_partition() {
        let mut records = Records::new();
        records.insert_case(case(1, "CASE_2025_001")).unwrap();
        for (id, lab) in ["25_1", "25_10", "25_2", "LT25_7", "24_99", "250_1"]
            .iter()
            .enumerate()
        {
            if LabNumber::parse(lab).is_ok() {
                records.insert_sample(sample(id as u64 + 1, 1, lab)).unwrap();
            }
        }
        let mut plain: Vec<&str> = records.lab_numbers_with_prefix("25_").collect();
        plain.sort_unstable();
        assert_eq!(plain, ["25_1", "25_10", "25_2"]);
        let legal: Vec<&str> = records.lab_numbers_with_prefix("LT25_").collect();
        assert_eq!(legal, ["LT25_7"]);
    }

    #[test]
    fn batch_wells_must_be_exclusive() {
        let mut records = Records::new();
        records.insert_case(case(1, "CASE_2025_001")).unwrap();
        records.insert_sample(sample(1, 1, "25_1")).unwrap();

        let err = records
            .insert_batch(
                batch(1, "PCR_1"),
                vec![well(1, "A01", None), well(1, "A01", Some(1))],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "well", .. }));

        let err = records
            .insert_batch(
                batch(1, "PCR_1"),
                vec![well(1, "B01", Some(1)), well(1, "C01", Some(1))],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "sample placement", .. }));

        records
            .insert_batch(batch(1, "PCR_1"), vec![well(1, "A01", None), well(1, "B01", Some(1))])
            .unwrap();
        let err = records
            .insert_batch(batch(2, "PCR_1"), Vec::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "batch number", .. }));
        assert_eq!(records.wells_for_batch(BatchId(1)).len(), 2);
        assert_eq!(records.next_batch_id(), BatchId(2));
    }

    #[test]
    fn snapshot_rebuilds_indices() {
        let mut records = Records::new();
        records.insert_case(case(1, "CASE_2025_001")).unwrap();
        records.insert_sample(sample(1, 1, "25_1")).unwrap();
        records
            .insert_batch(batch(1, "PCR_1"), vec![well(1, "B01", Some(1))])
            .unwrap();

        let rebuilt = Records::from_snapshot(records.to_snapshot()).unwrap();
        let lab = LabNumber::parse("25_1").unwrap();
        assert_eq!(rebuilt.sample_by_lab_number(&lab).map(|s| s.id), Some(SampleId(1)));
        assert_eq!(rebuilt.wells_for_batch(BatchId(1)).len(), 1);

        let mut snapshot = records.to_snapshot();
        snapshot.samples.push(sample(2, 1, "25_1"));
        assert!(matches!(
            Records::from_snapshot(snapshot),
            Err(StoreError::Corrupt(_))
        ));
    }
}
