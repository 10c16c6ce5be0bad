//! Concurrent callers sharing one store never receive the same number.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use chrono::{NaiveDate, TimeZone, Utc};
use labtrack_core::{FixedClock, LabService, NewCase, NewMember};
use labtrack_model::{ClientCategory, PlateGeometry, Relation};
use labtrack_store::{FileStore, MemoryStore, Store};
use proptest::prelude::*;

const THREADS: usize = 8;
const FAMILIES_PER_THREAD: usize = 5;

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap())
}

fn family() -> Vec<NewMember> {
    vec![
        NewMember::new(Relation::Child),
        NewMember::new(Relation::AllegedFather),
        NewMember::new(Relation::Mother),
    ]
}

fn case(category: ClientCategory) -> NewCase {
    NewCase {
        category,
        submitted_on: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        mother_present: true,
        comment: None,
    }
}

fn register_concurrently<S: Store + 'static>(store: S) -> (Vec<String>, Vec<String>) {
    let service = Arc::new(LabService::with_clock(
        store,
        clock(),
        PlateGeometry::STANDARD_96,
    ));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let mut labs = Vec::new();
                let mut cases = Vec::new();
                for _ in 0..FAMILIES_PER_THREAD {
                    let registration = service
                        .register_case(&case(ClientCategory::Paternity), &family())
                        .unwrap();
                    cases.push(registration.case.case_number.to_string());
                    labs.extend(registration.samples.iter().map(|s| s.lab_number.to_string()));
                }
                (labs, cases)
            })
        })
        .collect();

    let mut labs = Vec::new();
    let mut cases = Vec::new();
    for handle in handles {
        let (l, c) = handle.join().unwrap();
        labs.extend(l);
        cases.extend(c);
    }
    (labs, cases)
}

#[test]
fn concurrent_registrations_get_distinct_numbers() {
    let (labs, cases) = register_concurrently(MemoryStore::new());
    let total = THREADS * FAMILIES_PER_THREAD;
    assert_eq!(labs.len(), total * 3);
    assert_eq!(labs.iter().collect::<BTreeSet<_>>().len(), total * 3);
    assert_eq!(cases.iter().collect::<BTreeSet<_>>().len(), total);
}

#[test]
fn concurrent_registrations_on_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lab.json");
    let (labs, _) = register_concurrently(FileStore::open(&path).unwrap());
    assert_eq!(
        labs.iter().collect::<BTreeSet<_>>().len(),
        THREADS * FAMILIES_PER_THREAD * 3
    );

    let reopened = FileStore::open(&path).unwrap();
    let stored = reopened.read(|records| records.samples().count()).unwrap();
    assert_eq!(stored, labs.len());
}

#[test]
fn separate_file_stores_on_one_path_share_numbering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lab.json");
    let first = LabService::with_clock(
        FileStore::open(&path).unwrap(),
        clock(),
        PlateGeometry::STANDARD_96,
    );
    let second = LabService::with_clock(
        FileStore::open(&path).unwrap(),
        clock(),
        PlateGeometry::STANDARD_96,
    );
    let child = [NewMember::new(Relation::Child)];

    let a = first.register_case(&case(ClientCategory::Paternity), &child).unwrap();
    let b = second.register_case(&case(ClientCategory::Paternity), &child).unwrap();
    assert_eq!(a.case.case_number.to_string(), "CASE_2025_001");
    assert_eq!(b.case.case_number.to_string(), "CASE_2025_002");
    assert_eq!(a.samples[0].lab_number.to_string(), "25_1");
    assert_eq!(b.samples[0].lab_number.to_string(), "25_2");

    let c = first.register_case(&case(ClientCategory::Paternity), &child).unwrap();
    assert_eq!(c.samples[0].lab_number.to_string(), "25_3");

    let reopened = FileStore::open(&path).unwrap();
    let (cases, samples) = reopened
        .read(|records| (records.cases().count(), records.samples().count()))
        .unwrap();
    assert_eq!((cases, samples), (3, 3));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn lab_numbers_increase_within_a_partition(counts in proptest::collection::vec(1usize..5, 1..6)) {
        let service = LabService::with_clock(MemoryStore::new(), clock(), PlateGeometry::STANDARD_96);
        let mut last = 0u32;
        for count in counts {
            let members: Vec<NewMember> = (0..count).map(|_| NewMember::new(Relation::Child)).collect();
            let registration = service.register_case(&case(ClientCategory::Legal), &members).unwrap();
            for sample in &registration.samples {
                prop_assert_eq!(sample.lab_number.prefix(), labtrack_model::LabPrefix::Legal);
                prop_assert!(sample.lab_number.sequence() > last);
                last = sample.lab_number.sequence();
            }
        }
    }
}
