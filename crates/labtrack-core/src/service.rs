//! The operations exposed to calling layers.
//!
//! [`LabService`] is the only write path for cases, samples, batches and
//! well assignments. Each multi-step write runs in exactly one store
//! transaction; invariants are re-checked inside it against the committed
//! records, never against state read earlier.
//!
//! The service owns its store and does not hand it back out:
//!
//! ```compile_fail
//! use labtrack_core::LabService;
//! use labtrack_model::PlateGeometry;
//! use labtrack_store::MemoryStore;
//!
//! let service = LabService::new(MemoryStore::new(), PlateGeometry::STANDARD_96);
//! let _ = service.store();
//! ```

use std::collections::BTreeMap;

use labtrack_model::{
    Batch, BatchNumber, Case, CaseId, CaseNumber, CaseStatus, ClientCategory, LabNumber,
    PlateGeometry, Sample, SampleId, TransitionRecord, WellMap, WorkflowState,
};
use labtrack_store::{RecordSnapshot, Store};
use tracing::{info, info_span, warn};

use crate::allocator::{self, ControlPlacement, PlateRequest, PlateSample};
use crate::batch::{self, BatchCompletion, BatchDetail, BatchMeta};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, LabConfig};
use crate::error::{LabError, Result};
use crate::family;
use crate::intake::{self, NewCase, NewMember, NewSample, Registration};
use crate::sequencer;
use crate::workflow::{self, TransitionOutcome};

pub struct LabService<S, C = SystemClock> {
    store: S,
    clock: C,
    geometry: PlateGeometry,
    default_controls: Vec<ControlPlacement>,
}

impl<S: Store> LabService<S> {
    pub fn new(store: S, geometry: PlateGeometry) -> Self {
        Self::with_clock(store, SystemClock, geometry)
    }

    /// Builds a service with the geometry and control template of `config`.
    pub fn from_config(store: S, config: &LabConfig) -> std::result::Result<Self, ConfigError> {
        let geometry = config.geometry()?;
        let controls = config.default_controls()?;
        Ok(Self::new(store, geometry).with_default_controls(controls))
    }
}

impl<S: Store, C: Clock> LabService<S, C> {
    pub fn with_clock(store: S, clock: C, geometry: PlateGeometry) -> Self {
        Self {
            store,
            clock,
            geometry,
            default_controls: allocator::standard_controls(geometry),
        }
    }

    #[must_use]
    pub fn with_default_controls(mut self, controls: Vec<ControlPlacement>) -> Self {
        self.default_controls = controls;
        self
    }

    pub fn geometry(&self) -> PlateGeometry {
        self.geometry
    }

    pub fn default_controls(&self) -> &[ControlPlacement] {
        &self.default_controls
    }

    // ---------------------------------------------------------------------
    // Intake
    // ---------------------------------------------------------------------

    pub fn create_case(&self, data: &NewCase) -> Result<Case> {
        let span = info_span!("create_case", category = %data.category);
        let _guard = span.enter();
        let at = self.clock.now();
        let case = self
            .store
            .transaction(|records| intake::create_case(records, data, at))?;
        info!(case_number = %case.case_number, case_id = %case.id, "case created");
        Ok(case)
    }

    /// Registers a case together with its family members. Lab numbers are
    /// assigned child first, then alleged father, then mother, then others.
    pub fn register_case(&self, data: &NewCase, members: &[NewMember]) -> Result<Registration> {
        let span = info_span!("register_case", category = %data.category, members = members.len());
        let _guard = span.enter();
        let at = self.clock.now();
        let registration = self
            .store
            .transaction(|records| intake::register_case(records, data, members, at))?;
        info!(
            case_number = %registration.case.case_number,
            samples = registration.samples.len(),
            "case registered"
        );
        Ok(registration)
    }

    /// Creates one sample. Callers adding several members to one case must
    /// do so in family order.
    pub fn create_sample(&self, data: &NewSample) -> Result<Sample> {
        let span = info_span!("create_sample", case_id = %data.case_id, relation = %data.relation);
        let _guard = span.enter();
        let at = self.clock.now();
        let sample = self
            .store
            .transaction(|records| intake::create_sample(records, data, at))?;
        info!(lab_number = %sample.lab_number, sample_id = %sample.id, "sample created");
        Ok(sample)
    }

    /// Numbers the next intake would receive. Read-only: the numbers are not
    /// reserved and are recomputed at insert time.
    pub fn next_lab_numbers(&self, category: ClientCategory, count: usize) -> Result<Vec<LabNumber>> {
        let year = self.clock.year();
        self.store
            .read(|records| sequencer::next_lab_numbers(records, category, count, year))?
    }

    pub fn next_case_number(&self) -> Result<CaseNumber> {
        let year = self.clock.year();
        self.store
            .read(|records| sequencer::next_case_number(records, year))?
    }

    pub fn update_case(
        &self,
        case_id: CaseId,
        status: CaseStatus,
        comment: Option<String>,
    ) -> Result<Case> {
        let span = info_span!("update_case", case_id = %case_id, status = %status);
        let _guard = span.enter();
        let at = self.clock.now();
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let case = self.store.transaction(|records| -> Result<Case> {
            Ok(records.update_case(case_id, status, comment, at)?.clone())
        })?;
        info!(case_number = %case.case_number, "case updated");
        Ok(case)
    }

    /// Marks a sample cancelled. The record and its lab number are kept.
    pub fn cancel_sample(&self, sample_id: SampleId, reason: Option<String>) -> Result<Sample> {
        let span = info_span!("cancel_sample", sample_id = %sample_id);
        let _guard = span.enter();
        let at = self.clock.now();
        let sample = self.store.transaction(|records| -> Result<Sample> {
            let sample = records
                .sample(sample_id)
                .ok_or_else(|| LabError::not_found("sample", sample_id))?;
            if sample.is_cancelled() {
                return Err(LabError::AlreadyClosed {
                    entity: "sample",
                    key: sample.lab_number.to_string(),
                    status: "cancelled",
                });
            }
            Ok(records.cancel_sample(sample_id, reason, at)?.clone())
        })?;
        info!(lab_number = %sample.lab_number, "sample cancelled");
        Ok(sample)
    }

    // ---------------------------------------------------------------------
    // Workflow
    // ---------------------------------------------------------------------

    pub fn transition_sample(&self, sample_id: SampleId, target: WorkflowState) -> Result<Sample> {
        let span = info_span!("transition_sample", sample_id = %sample_id, state = %target);
        let _guard = span.enter();
        let at = self.clock.now();
        let sample = self.store.transaction(|records| -> Result<Sample> {
            workflow::apply_single(records, sample_id, target, at)?;
            records
                .sample(sample_id)
                .cloned()
                .ok_or_else(|| LabError::not_found("sample", sample_id))
        })?;
        info!(lab_number = %sample.lab_number, "sample transitioned");
        Ok(sample)
    }

    /// Moves every listed sample to `target` in one transaction. Unknown,
    /// cancelled and rerun-ineligible ids are reported back; the rest commit
    /// together.
    pub fn transition_samples(
        &self,
        sample_ids: &[SampleId],
        target: WorkflowState,
    ) -> Result<TransitionOutcome> {
        let span = info_span!("transition_samples", state = %target, requested = sample_ids.len());
        let _guard = span.enter();
        if sample_ids.is_empty() {
            return Err(LabError::validation(
                "sample_ids",
                "at least one sample id is required",
            ));
        }
        let at = self.clock.now();
        let outcome = self.store.transaction(|records| {
            workflow::apply_transitions(records, sample_ids, target, at, None)
        })?;
        if !outcome.is_complete() {
            warn!(rejected = outcome.rejected.len(), "some samples were not transitioned");
        }
        info!(updated = outcome.updated_count, "samples transitioned");
        Ok(outcome)
    }

    /// Count of active samples per stage; every stage is present.
    pub fn queue_counts(&self) -> Result<BTreeMap<WorkflowState, usize>> {
        Ok(self.store.read(|records| {
            let mut counts: BTreeMap<WorkflowState, usize> =
                WorkflowState::ALL.into_iter().map(|state| (state, 0)).collect();
            for sample in records.samples().filter(|s| !s.is_cancelled()) {
                *counts.entry(sample.state).or_default() += 1;
            }
            counts
        })?)
    }

    /// Active samples in `state`, grouped by case in family order.
    pub fn samples_in_state(&self, state: WorkflowState) -> Result<Vec<Sample>> {
        Ok(self.store.read(|records| {
            let mut samples: Vec<Sample> = records
                .samples()
                .filter(|s| !s.is_cancelled() && s.state == state)
                .cloned()
                .collect();
            samples.sort_by(|a, b| {
                a.case_id
                    .cmp(&b.case_id)
                    .then_with(|| family::family_order(a, b))
            });
            samples
        })?)
    }

    pub fn transition_history(&self, sample_id: SampleId) -> Result<Vec<TransitionRecord>> {
        self.store.read(|records| -> Result<Vec<TransitionRecord>> {
            records
                .sample(sample_id)
                .ok_or_else(|| LabError::not_found("sample", sample_id))?;
            Ok(records
                .transitions_for(sample_id)
                .into_iter()
                .cloned()
                .collect())
        })?
    }

    // ---------------------------------------------------------------------
    // Plates and batches
    // ---------------------------------------------------------------------

    /// Pure allocation on the configured geometry; persists nothing.
    pub fn allocate_plate(&self, request: &PlateRequest) -> Result<WellMap> {
        allocator::allocate_plate(&self.geometry, request)
    }

    /// Looks up samples for placement, labelled with their lab numbers and
    /// kept in the given order.
    pub fn plate_samples(&self, sample_ids: &[SampleId]) -> Result<Vec<PlateSample>> {
        self.store.read(|records| {
            sample_ids
                .iter()
                .map(|&id| {
                    let sample = records
                        .sample(id)
                        .ok_or_else(|| LabError::not_found("sample", id))?;
                    Ok(PlateSample::new(id, sample.lab_number.to_string()))
                })
                .collect::<Result<Vec<_>>>()
        })?
    }

    /// Auto-fills `sample_ids` around the default control template.
    pub fn plan_plate(&self, sample_ids: &[SampleId]) -> Result<WellMap> {
        let samples = self.plate_samples(sample_ids)?;
        self.allocate_plate(&PlateRequest::new(samples, self.default_controls.clone()))
    }

    pub fn fill_column(&self, map: &WellMap, column: u8, samples: &[PlateSample]) -> Result<WellMap> {
        allocator::fill_column(map, column, samples)
    }

    /// Persists the batch, its wells, the sample placements and the move of
    /// every placed sample to the kind's batched stage, all or nothing.
    pub fn commit_batch(&self, meta: &BatchMeta, map: &WellMap) -> Result<Batch> {
        let span = info_span!(
            "commit_batch",
            batch_number = %meta.batch_number,
            kind = %meta.kind
        );
        let _guard = span.enter();
        meta.validate()?;
        batch::validate_well_map(map, self.geometry)?;
        let at = self.clock.now();
        let batch = self
            .store
            .transaction(|records| batch::commit(records, meta, map, at))?;
        info!(
            batch_id = %batch.id,
            total_samples = batch.total_samples,
            state = %meta.kind.batched_state(),
            "batch committed"
        );
        Ok(batch)
    }

    pub fn complete_batch(&self, batch_number: &BatchNumber) -> Result<BatchCompletion> {
        let span = info_span!("complete_batch", batch_number = %batch_number);
        let _guard = span.enter();
        let at = self.clock.now();
        let completion = self
            .store
            .transaction(|records| batch::complete(records, batch_number, at))?;
        info!(advanced = completion.advanced, "batch completed");
        Ok(completion)
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    pub fn case(&self, case_id: CaseId) -> Result<Case> {
        self.store
            .read(|records| records.case(case_id).cloned())?
            .ok_or_else(|| LabError::not_found("case", case_id))
    }

    pub fn case_by_number(&self, number: &CaseNumber) -> Result<Case> {
        self.store
            .read(|records| records.case_by_number(number).cloned())?
            .ok_or_else(|| LabError::not_found("case", number))
    }

    pub fn cases(&self) -> Result<Vec<Case>> {
        Ok(self.store.read(|records| records.cases().cloned().collect())?)
    }

    /// Samples of one case in family order.
    pub fn samples_for_case(&self, case_id: CaseId) -> Result<Vec<Sample>> {
        self.store.read(|records| -> Result<Vec<Sample>> {
            records
                .case(case_id)
                .ok_or_else(|| LabError::not_found("case", case_id))?;
            let mut samples: Vec<Sample> = records
                .samples_for_case(case_id)
                .into_iter()
                .cloned()
                .collect();
            family::sort_family(&mut samples);
            Ok(samples)
        })?
    }

    pub fn sample(&self, sample_id: SampleId) -> Result<Sample> {
        self.store
            .read(|records| records.sample(sample_id).cloned())?
            .ok_or_else(|| LabError::not_found("sample", sample_id))
    }

    pub fn sample_by_lab_number(&self, number: &LabNumber) -> Result<Sample> {
        self.store
            .read(|records| records.sample_by_lab_number(number).cloned())?
            .ok_or_else(|| LabError::not_found("sample", number))
    }

    pub fn batch(&self, number: &BatchNumber) -> Result<BatchDetail> {
        self.store
            .read(|records| {
                records.batch_by_number(number).map(|batch| BatchDetail {
                    batch: batch.clone(),
                    wells: records.wells_for_batch(batch.id).to_vec(),
                })
            })?
            .ok_or_else(|| LabError::not_found("batch", number))
    }

    pub fn batches(&self) -> Result<Vec<Batch>> {
        Ok(self.store.read(|records| records.batches().cloned().collect())?)
    }

    /// Copy of every committed record, for export and comparison.
    pub fn snapshot(&self) -> Result<RecordSnapshot> {
        Ok(self.store.read(|records| records.to_snapshot())?)
    }
}
