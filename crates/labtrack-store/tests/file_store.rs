use chrono::{NaiveDate, TimeZone, Utc};
use labtrack_model::{
    Case, CaseId, CaseNumber, CaseStatus, ClientCategory, LabNumber, Relation, Sample, SampleId,
    SampleStatus, WorkflowState,
};
use labtrack_store::{FileStore, Store, StoreError};
use tempfile::tempdir;

fn case(id: u64, number: &str) -> Case {
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Case {
        id: CaseId(id),
        case_number: CaseNumber::parse(number).unwrap(),
        category: ClientCategory::Legal,
        submitted_on: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        mother_present: true,
        status: CaseStatus::Active,
        comment: None,
        created_at: at,
        updated_at: at,
    }
}

fn sample(id: u64, lab: &str, relation: Relation) -> Sample {
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Sample {
        id: SampleId(id),
        lab_number: LabNumber::parse(lab).unwrap(),
        case_id: CaseId(1),
        relation,
        donor_name: Some("Jane Roe".to_string()),
        collected_on: None,
        state: WorkflowState::SampleCollected,
        status: SampleStatus::Active,
        batch_id: None,
        well_position: None,
        cancel_reason: None,
        created_at: at,
        updated_at: at,
    }
}

#[test]
fn committed_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("lab.json");
    {
        let store = FileStore::open(&path).unwrap();
        store
            .transaction(|records| -> Result<(), StoreError> {
                records.insert_case(case(1, "CASE_2025_001"))?;
                records.insert_sample(sample(1, "LT25_1", Relation::Child))?;
                records.insert_sample(sample(2, "LT25_2", Relation::AllegedFather))?;
                Ok(())
            })
            .unwrap();
    }
    let reopened = FileStore::open(&path).unwrap();
    let labs: Vec<String> = reopened
        .read(|records| {
            records
                .lab_numbers_with_prefix("LT25_")
                .map(str::to_string)
                .collect()
        })
        .unwrap();
    assert_eq!(labs, ["LT25_1", "LT25_2"]);
}

#[test]
fn rolled_back_transaction_is_not_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lab.json");
    let store = FileStore::open(&path).unwrap();
    store
        .transaction(|records| records.insert_case(case(1, "CASE_2025_001")))
        .unwrap();
    let before = std::fs::read(&path).unwrap();

    let result = store.transaction(|records| -> Result<(), StoreError> {
        records.insert_sample(sample(1, "LT25_1", Relation::Child))?;
        records.insert_sample(sample(2, "LT25_1", Relation::Mother))?;
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Conflict { .. })));
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(store.read(|records| records.samples().count()).unwrap(), 0);
}

#[test]
fn second_handle_sees_commits_of_the_first() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("lab.json");
    let first = FileStore::open(&path).unwrap();
    let second = FileStore::open(&path).unwrap();

    first
        .transaction(|records| records.insert_case(case(1, "CASE_2025_001")))
        .unwrap();
    assert_eq!(second.read(|records| records.cases().count()).unwrap(), 1);

    let id = second
        .transaction(|records| -> Result<CaseId, StoreError> {
            let id = records.next_case_id();
            records.insert_case(case(id.get(), "CASE_2025_002"))
        })
        .unwrap();
    assert_eq!(id, CaseId(2));

    let duplicate = first.transaction(|records| records.insert_case(case(3, "CASE_2025_002")));
    assert!(matches!(duplicate, Err(StoreError::Conflict { .. })));

    let reopened = FileStore::open(&path).unwrap();
    assert_eq!(reopened.read(|records| records.cases().count()).unwrap(), 2);
    assert!(dir.path().join("lab.json.lock").exists());
}
