use std::collections::BTreeMap;

use labtrack_cli::render::{plate_text, queue_table, well_map_from_assignments};
use labtrack_core::{ControlPlacement, PlateRequest, PlateSample, allocate_plate};
use labtrack_model::{
    BatchId, ControlType, PlateGeometry, SampleId, WellAssignment, WellPosition, WellType,
    WorkflowState,
};

fn small_plate() -> labtrack_model::WellMap {
    let geometry = PlateGeometry::new(2, 3).unwrap();
    let request = PlateRequest::new(
        vec![
            PlateSample::new(SampleId(1), "25_1"),
            PlateSample::new(SampleId(2), "25_2"),
        ],
        vec![
            ControlPlacement::new(ControlType::AllelicLadder, WellPosition::new(0, 1).unwrap()),
            ControlPlacement::new(ControlType::PositiveControl, WellPosition::new(1, 3).unwrap()),
        ],
    );
    allocate_plate(&geometry, &request).unwrap()
}

#[test]
fn plain_plate_layout() {
    insta::assert_snapshot!(plate_text(&small_plate()), @r"
      01   02   03
    A LAD  25_2 .
    B 25_1 .    POS
    ");
}

#[test]
fn stored_wells_rebuild_the_layout() {
    let geometry = PlateGeometry::new(2, 3).unwrap();
    let wells = vec![
        WellAssignment {
            batch_id: BatchId(1),
            position: WellPosition::new(0, 1).unwrap(),
            well_type: WellType::AllelicLadder,
            sample_id: None,
            label: "Allelic Ladder".to_string(),
            comment: None,
        },
        WellAssignment {
            batch_id: BatchId(1),
            position: WellPosition::new(1, 1).unwrap(),
            well_type: WellType::Sample,
            sample_id: Some(SampleId(1)),
            label: "25_1".to_string(),
            comment: None,
        },
        WellAssignment {
            batch_id: BatchId(1),
            position: WellPosition::new(0, 2).unwrap(),
            well_type: WellType::Sample,
            sample_id: Some(SampleId(2)),
            label: "25_2".to_string(),
            comment: None,
        },
        WellAssignment {
            batch_id: BatchId(1),
            position: WellPosition::new(1, 3).unwrap(),
            well_type: WellType::PositiveControl,
            sample_id: None,
            label: "Positive Control".to_string(),
            comment: None,
        },
    ];
    let rebuilt = well_map_from_assignments(geometry, &wells);
    assert_eq!(rebuilt.sample_ids(), vec![SampleId(1), SampleId(2)]);
    assert_eq!(plate_text(&rebuilt), plate_text(&small_plate()));
}

#[test]
fn queue_table_lists_every_stage() {
    let mut counts = BTreeMap::new();
    counts.insert(WorkflowState::SampleCollected, 3);
    counts.insert(WorkflowState::PcrReady, 1);
    let rendered = queue_table(&counts).to_string();
    for state in WorkflowState::ALL {
        assert!(rendered.contains(state.as_str()), "{state}");
    }
    assert!(rendered.contains("TOTAL"));
}
