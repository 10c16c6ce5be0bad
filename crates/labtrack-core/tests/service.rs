//! End-to-end tests of the service operations against an in-memory store.

use chrono::{NaiveDate, TimeZone, Utc};
use labtrack_core::{
    ControlPlacement, ErrorKind, FamilyGroup, FixedClock, LabError, LabService, NewCase, NewMember,
    NewSample, PlateRequest, RejectReason,
};
use labtrack_core::batch::BatchMeta;
use labtrack_model::{
    BatchKind, BatchNumber, CaseStatus, ClientCategory, ControlType, LabNumber, PlateGeometry,
    Relation, SampleId, WellPosition, WellType, WorkflowState,
};
use labtrack_store::{MemoryStore, Store};

type Service = LabService<MemoryStore, FixedClock>;

fn service() -> Service {
    let clock = FixedClock(Utc.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap());
    LabService::with_clock(MemoryStore::new(), clock, PlateGeometry::STANDARD_96)
}

fn new_case(category: ClientCategory) -> NewCase {
    NewCase {
        category,
        submitted_on: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        mother_present: true,
        comment: None,
    }
}

fn new_sample(case_id: labtrack_model::CaseId, relation: Relation) -> NewSample {
    NewSample {
        case_id,
        relation,
        lab_number: None,
        donor_name: None,
        collected_on: None,
    }
}

fn pos(value: &str) -> WellPosition {
    WellPosition::parse(value).unwrap()
}

fn batch_meta(number: &str, kind: BatchKind) -> BatchMeta {
    BatchMeta::new(BatchNumber::new(number).unwrap(), kind, "JS")
}

/// Registers a trio and returns the sample ids in family order.
fn trio(service: &Service) -> Vec<SampleId> {
    let registration = service
        .register_case(
            &new_case(ClientCategory::Paternity),
            &[
                NewMember::new(Relation::Mother),
                NewMember::new(Relation::AllegedFather),
                NewMember::new(Relation::Child),
            ],
        )
        .unwrap();
    registration.samples.iter().map(|s| s.id).collect()
}

#[test]
fn trio_intake_to_pcr_batch() {
    let service = service();
    let case = service.create_case(&new_case(ClientCategory::Paternity)).unwrap();
    assert_eq!(case.case_number.to_string(), "CASE_2025_001");

    let child = service.create_sample(&new_sample(case.id, Relation::Child)).unwrap();
    let father = service
        .create_sample(&new_sample(case.id, Relation::AllegedFather))
        .unwrap();
    let mother = service.create_sample(&new_sample(case.id, Relation::Mother)).unwrap();
    let labs: Vec<String> = [&child, &father, &mother]
        .iter()
        .map(|s| s.lab_number.to_string())
        .collect();
    assert_eq!(labs, ["25_1", "25_2", "25_3"]);

    let ids = [child.id, father.id, mother.id];
    let samples = service.plate_samples(&ids).unwrap();
    let ladder = vec![ControlPlacement::new(ControlType::AllelicLadder, pos("A01"))];
    let map = service
        .allocate_plate(&PlateRequest::new(samples, ladder))
        .unwrap();
    let batch = service
        .commit_batch(&batch_meta("PCR_0314", BatchKind::Pcr), &map)
        .unwrap();
    assert_eq!(batch.total_samples, 3);

    for id in ids {
        assert_eq!(service.sample(id).unwrap().state, WorkflowState::PcrBatched);
    }
    let detail = service.batch(&batch.batch_number).unwrap();
    let wells: Vec<(String, WellType, String)> = detail
        .wells
        .iter()
        .map(|w| (w.position.to_string(), w.well_type, w.label.clone()))
        .collect();
    assert_eq!(
        wells,
        [
            ("A01".to_string(), WellType::AllelicLadder, "Allelic Ladder".to_string()),
            ("B01".to_string(), WellType::Sample, "25_1".to_string()),
            ("C01".to_string(), WellType::Sample, "25_2".to_string()),
            ("D01".to_string(), WellType::Sample, "25_3".to_string()),
        ]
    );
    let placed = service.sample(child.id).unwrap();
    assert_eq!(placed.batch_id, Some(batch.id));
    assert_eq!(placed.well_position, Some(pos("B01")));
    let history = service.transition_history(child.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].batch_id, Some(batch.id));
}

#[test]
fn registration_numbers_child_father_mother() {
    let service = service();
    let ids = trio(&service);
    let samples: Vec<_> = ids.iter().map(|&id| service.sample(id).unwrap()).collect();
    let by_relation = |relation: Relation| {
        samples
            .iter()
            .find(|s| s.relation == relation)
            .map(|s| s.lab_number.sequence())
            .unwrap()
    };
    let child = by_relation(Relation::Child);
    let father = by_relation(Relation::AllegedFather);
    let mother = by_relation(Relation::Mother);
    assert!(child < father && father < mother);

    let case_id = samples[0].case_id;
    let listed: Vec<Relation> = service
        .samples_for_case(case_id)
        .unwrap()
        .into_iter()
        .map(|s| s.relation)
        .collect();
    assert_eq!(listed, [Relation::Child, Relation::AllegedFather, Relation::Mother]);
}

#[test]
fn legal_cases_use_lt_partition() {
    let service = service();
    let legal = service.create_case(&new_case(ClientCategory::Legal)).unwrap();
    let sample = service.create_sample(&new_sample(legal.id, Relation::Child)).unwrap();
    assert_eq!(sample.lab_number.to_string(), "LT25_1");
    assert_eq!(
        service
            .next_lab_numbers(ClientCategory::Paternity, 2)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        ["25_1", "25_2"]
    );
    assert_eq!(service.next_case_number().unwrap().to_string(), "CASE_2025_002");

    let mut wrong_prefix = new_sample(legal.id, Relation::Mother);
    wrong_prefix.lab_number = Some(LabNumber::parse("25_9").unwrap());
    let err = service.create_sample(&wrong_prefix).unwrap_err();
    assert!(matches!(err, LabError::Validation { field: "lab_number", .. }));

    let mut duplicate = new_sample(legal.id, Relation::Mother);
    duplicate.lab_number = Some(LabNumber::parse("LT25_1").unwrap());
    assert_eq!(service.create_sample(&duplicate).unwrap_err().kind(), ErrorKind::Conflict);
}

#[test]
fn sample_for_unknown_case_is_not_found() {
    let service = service();
    let err = service
        .create_sample(&new_sample(labtrack_model::CaseId(42), Relation::Child))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn batch_transition_reports_unknown_ids() {
    let service = service();
    let ids = trio(&service);

    let outcome = service
        .transition_samples(&[ids[0], ids[1]], WorkflowState::PcrBatched)
        .unwrap();
    assert_eq!(outcome.updated_count, 2);
    assert!(outcome.rejected_ids().is_empty());

    let unknown = SampleId(999);
    let outcome = service
        .transition_samples(&[ids[2], unknown], WorkflowState::PcrBatched)
        .unwrap();
    assert_eq!(outcome.updated_count, 1);
    assert_eq!(outcome.rejected_ids(), [unknown]);
    assert_eq!(outcome.rejected[0].reason, RejectReason::NotFound);
    assert_eq!(service.sample(ids[2]).unwrap().state, WorkflowState::PcrBatched);

    let err = service
        .transition_samples(&[], WorkflowState::PcrBatched)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn single_transition_checks_state_and_existence() {
    let service = service();
    let ids = trio(&service);
    service.transition_sample(ids[0], WorkflowState::ReportReady).unwrap();
    assert_eq!(
        service.transition_sample(SampleId(77), WorkflowState::PcrReady).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    let invalid: Result<WorkflowState, _> = "done".parse();
    assert_eq!(LabError::from(invalid.unwrap_err()).kind(), ErrorKind::Validation);
}

#[test]
fn queue_views_skip_cancelled_samples() {
    let service = service();
    let ids = trio(&service);
    service
        .transition_samples(&[ids[0], ids[1]], WorkflowState::PcrReady)
        .unwrap();
    service.cancel_sample(ids[1], Some("insufficient DNA".to_string())).unwrap();

    let counts = service.queue_counts().unwrap();
    assert_eq!(counts.len(), WorkflowState::ALL.len());
    assert_eq!(counts[&WorkflowState::PcrReady], 1);
    assert_eq!(counts[&WorkflowState::SampleCollected], 1);
    assert_eq!(counts[&WorkflowState::ReportSent], 0);

    let ready: Vec<SampleId> = service
        .samples_in_state(WorkflowState::PcrReady)
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(ready, [ids[0]]);

    let err = service.cancel_sample(ids[1], None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = service
        .transition_sample(ids[1], WorkflowState::PcrBatched)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn cancelled_sample_stays_put_without_audit_entries() {
    let service = service();
    let ids = trio(&service);
    service.cancel_sample(ids[0], None).unwrap();
    let before = service.snapshot().unwrap();

    let err = service
        .transition_sample(ids[0], WorkflowState::ReportSent)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let outcome = service
        .transition_samples(&[ids[0]], WorkflowState::ReportSent)
        .unwrap();
    assert_eq!(outcome.updated_count, 0);
    assert_eq!(outcome.rejected[0].reason, RejectReason::Cancelled);

    assert_eq!(service.snapshot().unwrap(), before);
    let sample = service.sample(ids[0]).unwrap();
    assert!(sample.is_cancelled());
    assert_eq!(sample.state, WorkflowState::SampleCollected);
    assert!(service.transition_history(ids[0]).unwrap().is_empty());
}

#[test]
fn failed_commit_leaves_no_trace() {
    let service = service();
    let ids = trio(&service);
    let map = service.plan_plate(&ids[..2]).unwrap();
    service
        .commit_batch(&batch_meta("PCR_0314", BatchKind::Pcr), &map)
        .unwrap();

    let before = service.snapshot().unwrap();
    let second = service.plan_plate(&ids[2..]).unwrap();
    let err = service
        .commit_batch(&batch_meta("PCR_0314", BatchKind::Pcr), &second)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let after = service.snapshot().unwrap();
    assert_eq!(before, after);
    assert_eq!(service.sample(ids[2]).unwrap().state, WorkflowState::SampleCollected);
}

#[test]
fn commit_rejects_cancelled_and_ineligible_samples() {
    let service = service();
    let ids = trio(&service);
    service.cancel_sample(ids[2], None).unwrap();
    let map = service.plan_plate(&ids).unwrap();
    let err = service
        .commit_batch(&batch_meta("PCR_0315", BatchKind::Pcr), &map)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.sample(ids[0]).unwrap().state, WorkflowState::SampleCollected);
    assert!(service.batches().unwrap().is_empty());

    let rerun = service.plan_plate(&ids[..1]).unwrap();
    let err = service
        .commit_batch(&batch_meta("ELE_0315_RR", BatchKind::Rerun), &rerun)
        .unwrap_err();
    assert!(matches!(err, LabError::Validation { field: "state", .. }));

    service
        .transition_sample(ids[0], WorkflowState::ElectroCompleted)
        .unwrap();
    service
        .commit_batch(&batch_meta("ELE_0315_RR", BatchKind::Rerun), &rerun)
        .unwrap();
    assert_eq!(service.sample(ids[0]).unwrap().state, WorkflowState::RerunBatched);
}

#[test]
fn commit_rejects_unknown_samples_and_tampered_maps() {
    let service = service();
    let ids = trio(&service);
    let mut map = service.plan_plate(&ids[..1]).unwrap();
    let index = map
        .wells
        .iter()
        .position(|w| w.well_type == WellType::Sample)
        .unwrap();
    map.wells[index].sample_id = Some(SampleId(500));
    let err = service
        .commit_batch(&batch_meta("PCR_0316", BatchKind::Pcr), &map)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    map.wells[index].sample_id = None;
    let err = service
        .commit_batch(&batch_meta("PCR_0316", BatchKind::Pcr), &map)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn completing_a_batch_advances_waiting_samples() {
    let service = service();
    let ids = trio(&service);
    let map = service.plan_plate(&ids).unwrap();
    let batch = service
        .commit_batch(&batch_meta("PCR_0317", BatchKind::Pcr), &map)
        .unwrap();
    service
        .transition_sample(ids[2], WorkflowState::PcrReady)
        .unwrap();

    let completion = service.complete_batch(&batch.batch_number).unwrap();
    assert_eq!(completion.advanced, 2);
    assert!(completion.batch.completed_at.is_some());
    assert_eq!(service.sample(ids[0]).unwrap().state, WorkflowState::PcrCompleted);
    assert_eq!(service.sample(ids[2]).unwrap().state, WorkflowState::PcrReady);

    let err = service.complete_batch(&batch.batch_number).unwrap_err();
    assert!(matches!(err, LabError::AlreadyClosed { .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        service
            .complete_batch(&BatchNumber::new("PCR_9999").unwrap())
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn family_group_lands_in_adjacent_wells() {
    let service = service();
    let ids = trio(&service);
    let family = service.plate_samples(&ids).unwrap();
    let request = PlateRequest::new(Vec::new(), service.default_controls().to_vec()).with_group(
        FamilyGroup {
            anchor: pos("F03"),
            members: family,
        },
    );
    let map = service.allocate_plate(&request).unwrap();
    let placed: Vec<String> = map.sample_wells().map(|w| w.position.to_string()).collect();
    assert_eq!(placed, ["F03", "G03", "H03"]);
}

#[test]
fn case_updates_touch_only_status_and_comment() {
    let service = service();
    let case = service.create_case(&new_case(ClientCategory::Urgent)).unwrap();
    let updated = service
        .update_case(case.id, CaseStatus::OnHold, Some("  awaiting consent ".to_string()))
        .unwrap();
    assert_eq!(updated.status, CaseStatus::OnHold);
    assert_eq!(updated.comment.as_deref(), Some("awaiting consent"));
    assert_eq!(updated.case_number, case.case_number);
    assert_eq!(
        service.case_by_number(&case.case_number).unwrap().status,
        CaseStatus::OnHold
    );
    assert_eq!(
        service
            .update_case(labtrack_model::CaseId(9), CaseStatus::Completed, None)
            .unwrap_err()
            .kind(),
        ErrorKind::NotFound
    );
}
