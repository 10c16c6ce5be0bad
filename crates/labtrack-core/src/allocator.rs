//! Plate allocation.
//!
//! Allocation is a pure function from an ordered sample list plus control
//! placements to a complete [`WellMap`]; nothing is persisted here. Fill order
//! is column-major (`A01..H01`, then `A02..`), the layout the plate readers
//! expect.
//!
//! Steps, in order:
//!
//! 1. start from an all-empty plate of the injected geometry
//! 2. reserve control wells (two controls on one well is a validation error)
//! 3. place family groups contiguously from their anchors
//! 4. auto-fill the remaining samples into the empty wells
//!
//! Capacity is checked before anything is placed, so an oversized request
//! never yields a partial plate.

use std::collections::BTreeSet;

use labtrack_model::{ControlType, PlateGeometry, SampleId, Well, WellMap, WellPosition, WellType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LabError, Result};

/// A sample to be placed, with the label printed on its well (normally the
/// lab number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateSample {
    pub sample_id: SampleId,
    pub label: String,
}

impl PlateSample {
    pub fn new(sample_id: SampleId, label: impl Into<String>) -> Self {
        Self {
            sample_id,
            label: label.into(),
        }
    }
}

/// Related samples that must occupy consecutive free wells starting at
/// `anchor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyGroup {
    pub anchor: WellPosition,
    pub members: Vec<PlateSample>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlacement {
    pub control: ControlType,
    pub position: WellPosition,
}

impl ControlPlacement {
    pub fn new(control: ControlType, position: WellPosition) -> Self {
        Self { control, position }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateRequest {
    /// Auto-filled in this order.
    pub samples: Vec<PlateSample>,
    pub groups: Vec<FamilyGroup>,
    pub controls: Vec<ControlPlacement>,
}

impl PlateRequest {
    pub fn new(samples: Vec<PlateSample>, controls: Vec<ControlPlacement>) -> Self {
        Self {
            samples,
            groups: Vec::new(),
            controls,
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: FamilyGroup) -> Self {
        self.groups.push(group);
        self
    }

    fn sample_total(&self) -> usize {
        self.samples.len() + self.groups.iter().map(|g| g.members.len()).sum::<usize>()
    }
}

/// Conventional control template scaled to `geometry`: allelic ladder in the
/// first well, negative control in the second-to-last well of the bottom
/// row, positive control in the last well. On plates too small to hold all
/// three apart, later controls that would collide are left out.
pub fn standard_controls(geometry: PlateGeometry) -> Vec<ControlPlacement> {
    let last_row = geometry.rows() - 1;
    let last_column = geometry.columns();
    let candidates = [
        (ControlType::AllelicLadder, 0, 1),
        (ControlType::NegativeControl, last_row, last_column.saturating_sub(1)),
        (ControlType::PositiveControl, last_row, last_column),
    ];
    let mut placements: Vec<ControlPlacement> = Vec::new();
    for (control, row, column) in candidates {
        let Ok(position) = WellPosition::new(row, column) else {
            continue;
        };
        if placements.iter().any(|p| p.position == position) {
            continue;
        }
        placements.push(ControlPlacement::new(control, position));
    }
    placements
}

/// Produces the well map for `request` on a plate of `geometry`.
pub fn allocate_plate(geometry: &PlateGeometry, request: &PlateRequest) -> Result<WellMap> {
    let mut map = WellMap::empty(*geometry);
    reserve_controls(&mut map, &request.controls)?;
    check_unique_samples(
        request
            .groups
            .iter()
            .flat_map(|g| g.members.iter())
            .chain(request.samples.iter()),
    )?;

    let requested = request.sample_total();
    let available = map.empty_count();
    if requested > available {
        return Err(LabError::Capacity {
            requested,
            available,
        });
    }

    for group in &request.groups {
        place_group(&mut map, group)?;
    }
    let mut free = free_indices(&map, 0).into_iter();
    for sample in &request.samples {
        let index = free.next().ok_or(LabError::Capacity {
            requested,
            available,
        })?;
        put_sample(&mut map.wells[index], sample);
    }

    debug!(
        rows = geometry.rows(),
        columns = geometry.columns(),
        controls = request.controls.len(),
        groups = request.groups.len(),
        samples = map.sample_count(),
        "plate allocated"
    );
    Ok(map)
}

/// Places `samples` top to bottom into the empty wells of `column`, leaving
/// every other well untouched.
pub fn fill_column(map: &WellMap, column: u8, samples: &[PlateSample]) -> Result<WellMap> {
    let positions = map.geometry.column_positions(column);
    if positions.is_empty() {
        return Err(LabError::validation(
            "column",
            format!(
                "column {column} is outside a plate of {} columns",
                map.geometry.columns()
            ),
        ));
    }
    let on_plate: BTreeSet<SampleId> = map.sample_ids().into_iter().collect();
    if let Some(sample) = samples.iter().find(|s| on_plate.contains(&s.sample_id)) {
        return Err(LabError::validation(
            "samples",
            format!("sample {} is already on the plate", sample.sample_id),
        ));
    }
    check_unique_samples(samples.iter())?;

    let mut filled = map.clone();
    let free: Vec<usize> = positions
        .into_iter()
        .filter_map(|position| filled.wells.iter().position(|w| w.position == position))
        .filter(|&index| filled.wells[index].is_empty())
        .collect();
    if samples.len() > free.len() {
        return Err(LabError::Capacity {
            requested: samples.len(),
            available: free.len(),
        });
    }
    for (index, sample) in free.into_iter().zip(samples) {
        put_sample(&mut filled.wells[index], sample);
    }
    debug!(column, placed = samples.len(), "column filled");
    Ok(filled)
}

fn reserve_controls(map: &mut WellMap, controls: &[ControlPlacement]) -> Result<()> {
    for placement in controls {
        let position = map.geometry.check(placement.position)?;
        let index = map
            .geometry
            .index_of(position)
            .ok_or_else(|| LabError::validation("position", position.to_string()))?;
        let well = &mut map.wells[index];
        if !well.is_empty() {
            return Err(LabError::validation(
                "controls",
                format!(
                    "{} and {} both target {position}",
                    well.well_type, placement.control
                ),
            ));
        }
        well.well_type = placement.control.well_type();
        well.label = placement.control.label().to_string();
    }
    Ok(())
}

fn check_unique_samples<'a>(samples: impl Iterator<Item = &'a PlateSample>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for sample in samples {
        if !seen.insert(sample.sample_id) {
            return Err(LabError::validation(
                "samples",
                format!("sample {} is listed more than once", sample.sample_id),
            ));
        }
    }
    Ok(())
}

fn place_group(map: &mut WellMap, group: &FamilyGroup) -> Result<()> {
    if group.members.is_empty() {
        return Err(LabError::validation("group", "family group has no members"));
    }
    let anchor = map.geometry.check(group.anchor)?;
    let start = map
        .geometry
        .index_of(anchor)
        .ok_or_else(|| LabError::validation("anchor", anchor.to_string()))?;
    if !map.wells[start].is_empty() {
        return Err(LabError::WellOccupied {
            position: anchor.to_string(),
        });
    }
    let mut slots = free_indices(map, start);
    slots.truncate(group.members.len());
    if slots.len() < group.members.len() {
        return Err(LabError::GroupDoesNotFit {
            anchor: anchor.to_string(),
            size: group.members.len(),
            available: slots.len(),
        });
    }
    for (index, member) in slots.into_iter().zip(&group.members) {
        put_sample(&mut map.wells[index], member);
    }
    Ok(())
}

/// Column-major indices of empty wells at or after `start`.
fn free_indices(map: &WellMap, start: usize) -> Vec<usize> {
    map.wells
        .iter()
        .enumerate()
        .skip(start)
        .filter(|(_, well)| well.is_empty())
        .map(|(index, _)| index)
        .collect()
}

fn put_sample(well: &mut Well, sample: &PlateSample) {
    well.well_type = WellType::Sample;
    well.sample_id = Some(sample.sample_id);
    well.label.clone_from(&sample.label);
}
