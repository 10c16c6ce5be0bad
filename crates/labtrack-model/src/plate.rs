//! Plate geometry, well positions and well maps.
//!
//! Wells are addressed as row letter plus zero-padded column (`A01`..`H12` on a
//! standard 96-well plate). The canonical walk over a plate is column-major:
//! `A01, B01, .., H01, A02, ..`. Plate readers expect samples in that order.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::enums::WellType;
use crate::error::ModelError;
use crate::ids::SampleId;

/// Rows and columns of a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateGeometry {
    rows: u8,
    columns: u8,
}

impl PlateGeometry {
    pub const MAX_ROWS: u8 = 26;
    pub const MAX_COLUMNS: u8 = 99;

    /// The standard 8x12 plate.
    pub const STANDARD_96: PlateGeometry = PlateGeometry {
        rows: 8,
        columns: 12,
    };

    pub fn new(rows: u8, columns: u8) -> Result<Self, ModelError> {
        if rows == 0 || columns == 0 || rows > Self::MAX_ROWS || columns > Self::MAX_COLUMNS {
            return Err(ModelError::InvalidGeometry { rows, columns });
        }
        Ok(Self { rows, columns })
    }

    pub fn rows(&self) -> u8 {
        self.rows
    }

    pub fn columns(&self) -> u8 {
        self.columns
    }

    /// Number of addressable wells.
    pub fn capacity(&self) -> usize {
        usize::from(self.rows) * usize::from(self.columns)
    }

    pub fn contains(&self, position: WellPosition) -> bool {
        position.row < self.rows && position.column >= 1 && position.column <= self.columns
    }

    pub fn check(&self, position: WellPosition) -> Result<WellPosition, ModelError> {
        if self.contains(position) {
            Ok(position)
        } else {
            Err(ModelError::WellOutsidePlate {
                position: position.to_string(),
                rows: self.rows,
                columns: self.columns,
            })
        }
    }

    /// Parses a position and checks it lies on this plate.
    pub fn parse_position(&self, value: &str) -> Result<WellPosition, ModelError> {
        self.check(WellPosition::parse(value)?)
    }

    /// Column-major index of a position (A01 = 0, B01 = 1, ..).
    pub fn index_of(&self, position: WellPosition) -> Option<usize> {
        self.contains(position).then(|| {
            usize::from(position.column - 1) * usize::from(self.rows) + usize::from(position.row)
        })
    }

    /// Position at a column-major index.
    pub fn position_at(&self, index: usize) -> Option<WellPosition> {
        if index >= self.capacity() {
            return None;
        }
        let rows = usize::from(self.rows);
        let row = u8::try_from(index % rows).ok()?;
        let column = u8::try_from(index / rows + 1).ok()?;
        Some(WellPosition { row, column })
    }

    /// Every position in column-major order.
    pub fn column_major(&self) -> impl Iterator<Item = WellPosition> + '_ {
        (0..self.capacity()).filter_map(|index| self.position_at(index))
    }

    /// Positions of one column, top to bottom.
    pub fn column_positions(&self, column: u8) -> Vec<WellPosition> {
        if column == 0 || column > self.columns {
            return Vec::new();
        }
        (0..self.rows)
            .map(|row| WellPosition { row, column })
            .collect()
    }
}

impl Default for PlateGeometry {
    fn default() -> Self {
        Self::STANDARD_96
    }
}

/// A well address such as `A01`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WellPosition {
    row: u8,
    column: u8,
}

impl WellPosition {
    /// Builds a position from a zero-based row and one-based column.
    pub fn new(row: u8, column: u8) -> Result<Self, ModelError> {
        if row >= PlateGeometry::MAX_ROWS || column == 0 || column > PlateGeometry::MAX_COLUMNS {
            return Err(ModelError::InvalidWellPosition(format!("row {row}, column {column}")));
        }
        Ok(Self { row, column })
    }

    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn column(&self) -> u8 {
        self.column
    }

    pub fn row_letter(&self) -> char {
        char::from(b'A' + self.row)
    }

    /// Parses `A01`-style positions as typed by a user. Surrounding
    /// whitespace is ignored and the row letter is case-insensitive; the
    /// column must be exactly two digits.
    pub fn parse(value: &str) -> Result<Self, ModelError> {
        Self::parse_canonical(&value.trim().to_ascii_uppercase())
            .map_err(|_| ModelError::InvalidWellPosition(value.to_string()))
    }

    /// Parses the stored form exactly as [`Display`](fmt::Display) writes it:
    /// one uppercase row letter followed by a two-digit column.
    pub fn parse_canonical(value: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidWellPosition(value.to_string());
        let &[letter, tens, ones] = value.as_bytes() else {
            return Err(invalid());
        };
        if !letter.is_ascii_uppercase() || !tens.is_ascii_digit() || !ones.is_ascii_digit() {
            return Err(invalid());
        }
        let column = (tens - b'0') * 10 + (ones - b'0');
        Self::new(letter - b'A', column).map_err(|_| invalid())
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.row_letter(), self.column)
    }
}

impl FromStr for WellPosition {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WellPosition {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_canonical(&value)
    }
}

impl From<WellPosition> for String {
    fn from(value: WellPosition) -> Self {
        value.to_string()
    }
}

/// One cell of a well map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Well {
    pub position: WellPosition,
    pub well_type: WellType,
    pub sample_id: Option<SampleId>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Well {
    pub fn empty(position: WellPosition) -> Self {
        Self {
            position,
            well_type: WellType::Empty,
            sample_id: None,
            label: String::new(),
            comment: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.well_type == WellType::Empty
    }
}

/// Full layout of one plate, one entry per addressable well in column-major
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellMap {
    pub geometry: PlateGeometry,
    pub wells: Vec<Well>,
}

impl WellMap {
    /// A plate with every well empty.
    pub fn empty(geometry: PlateGeometry) -> Self {
        Self {
            geometry,
            wells: geometry.column_major().map(Well::empty).collect(),
        }
    }

    pub fn get(&self, position: WellPosition) -> Option<&Well> {
        let index = self.geometry.index_of(position)?;
        self.wells.get(index).filter(|well| well.position == position)
    }

    /// Wells that are not empty, in column-major order.
    pub fn occupied(&self) -> impl Iterator<Item = &Well> {
        self.wells.iter().filter(|well| !well.is_empty())
    }

    /// Wells holding samples, in column-major order.
    pub fn sample_wells(&self) -> impl Iterator<Item = &Well> {
        self.wells
            .iter()
            .filter(|well| well.well_type == WellType::Sample)
    }

    pub fn sample_ids(&self) -> Vec<SampleId> {
        self.sample_wells().filter_map(|well| well.sample_id).collect()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_wells().count()
    }

    pub fn empty_count(&self) -> usize {
        self.wells.iter().filter(|well| well.is_empty()).count()
    }

    /// Checks the structural invariants of a well map received from outside:
    /// one entry per well, no repeated position, no sample in two wells, and
    /// sample references present exactly on `Sample` wells.
    pub fn validate(&self) -> Result<(), ModelError> {
        let expected = self.geometry.capacity();
        let mut positions = BTreeSet::new();
        let mut samples = BTreeSet::new();
        for well in &self.wells {
            let position = self.geometry.check(well.position)?;
            let index = self.geometry.index_of(position).unwrap_or(usize::MAX);
            if !positions.insert(index) {
                return Err(ModelError::DuplicateWell(position.to_string()));
            }
            match (well.well_type, well.sample_id) {
                (WellType::Sample, Some(sample_id)) => {
                    if !samples.insert(sample_id) {
                        return Err(ModelError::DuplicateSample {
                            sample_id: sample_id.get(),
                        });
                    }
                }
                (WellType::Sample, None) => {
                    return Err(ModelError::InconsistentWell {
                        position: position.to_string(),
                        reason: "sample well without a sample".to_string(),
                    });
                }
                (other, Some(_)) => {
                    return Err(ModelError::InconsistentWell {
                        position: position.to_string(),
                        reason: format!("{other} well must not reference a sample"),
                    });
                }
                (_, None) => {}
            }
        }
        if self.wells.len() != expected {
            return Err(ModelError::IncompleteWellMap {
                expected,
                found: self.wells.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_positions() {
        let position = WellPosition::parse("A01").expect("A01");
        assert_eq!((position.row(), position.column()), (0, 1));
        assert_eq!(WellPosition::parse("h12").expect("h12").to_string(), "H12");
        for bad in ["A1", "A00", "A123", "101", "", "AA1"] {
            assert!(WellPosition::parse(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn stored_positions_must_be_canonical() {
        assert!(WellPosition::parse_canonical("H12").is_ok());
        for bad in ["h12", " H12", "H12 ", "A00", "A1", "[01"] {
            assert!(
                WellPosition::parse_canonical(bad).is_err(),
                "{bad:?} should be rejected"
            );
            let json = format!("{bad:?}");
            assert!(serde_json::from_str::<WellPosition>(&json).is_err(), "{json}");
        }
        let stored: WellPosition = serde_json::from_str("\"B03\"").expect("B03");
        assert_eq!(stored.to_string(), "B03");
    }

    #[test]
    fn standard_plate_bounds() {
        let plate = PlateGeometry::STANDARD_96;
        assert_eq!(plate.capacity(), 96);
        assert!(plate.parse_position("H12").is_ok());
        assert!(plate.parse_position("I01").is_err());
        assert!(plate.parse_position("A13").is_err());
        assert!(PlateGeometry::new(0, 12).is_err());
        assert!(PlateGeometry::new(27, 12).is_err());
    }

    #[test]
    fn column_major_walk() {
        let plate = PlateGeometry::STANDARD_96;
        let first: Vec<String> = plate.column_major().take(10).map(|p| p.to_string()).collect();
        assert_eq!(
            first,
            ["A01", "B01", "C01", "D01", "E01", "F01", "G01", "H01", "A02", "B02"]
        );
        let last = plate.column_major().last().expect("last");
        assert_eq!(last.to_string(), "H12");
        let h11 = WellPosition::parse("H11").expect("H11");
        assert_eq!(plate.index_of(h11), Some(87));
        assert_eq!(plate.position_at(87), Some(h11));
    }

    #[test]
    fn empty_map_validates() {
        let map = WellMap::empty(PlateGeometry::new(2, 3).expect("geometry"));
        assert_eq!(map.wells.len(), 6);
        assert_eq!(map.empty_count(), 6);
        assert!(map.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_sample() {
        let geometry = PlateGeometry::new(1, 2).expect("geometry");
        let mut map = WellMap::empty(geometry);
        for well in &mut map.wells {
            well.well_type = WellType::Sample;
            well.sample_id = Some(SampleId(1));
        }
        assert_eq!(
            map.validate(),
            Err(ModelError::DuplicateSample { sample_id: 1 })
        );
    }

    #[test]
    fn validate_rejects_control_with_sample() {
        let geometry = PlateGeometry::new(1, 1).expect("geometry");
        let mut map = WellMap::empty(geometry);
        map.wells[0].well_type = WellType::AllelicLadder;
        map.wells[0].sample_id = Some(SampleId(3));
        assert!(matches!(
            map.validate(),
            Err(ModelError::InconsistentWell { .. })
        ));
    }
}
