//! Identifier sequencing for cases and samples.
//!
//! Numbers are derived by scanning the records that already exist: the next
//! lab number in a partition is one past the highest stored sequence. There
//! is no separate counter. Callers must run the scan in the same store
//! transaction as the insert that consumes the numbers; the store serializes
//! transactions, so two callers can never be handed the same number.
//!
//! Lab numbers partition by (prefix, two-digit year); case numbers by
//! four-digit year.

use labtrack_model::{CaseNumber, ClientCategory, LabNumber, LabPrefix};
use labtrack_store::Records;
use tracing::debug;

use crate::error::{LabError, Result};

/// Partition a lab number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabPartition {
    pub prefix: LabPrefix,
    /// Year modulo 100.
    pub year: u8,
}

impl LabPartition {
    pub fn new(category: ClientCategory, year: i32) -> Self {
        // rem_euclid(100) is always within 0..100
        let year = u8::try_from(year.rem_euclid(100)).unwrap_or_default();
        Self {
            prefix: category.lab_prefix(),
            year,
        }
    }

    /// Scan prefix, e.g. `LT25_`.
    pub fn scan_prefix(&self) -> String {
        LabNumber::partition_prefix(self.prefix, self.year)
    }
}

/// Highest sequence already used in a partition, 0 when the partition is empty.
pub fn max_lab_sequence(records: &Records, partition: LabPartition) -> u32 {
    let prefix = partition.scan_prefix();
    records
        .lab_numbers_with_prefix(&prefix)
        .filter_map(sequence_after_first_underscore)
        .max()
        .unwrap_or(0)
}

/// Returns `count` consecutive lab numbers following the highest existing one
/// in the partition of `category` and `year`.
pub fn next_lab_numbers(
    records: &Records,
    category: ClientCategory,
    count: usize,
    year: i32,
) -> Result<Vec<LabNumber>> {
    if count == 0 {
        return Err(LabError::validation(
            "count",
            "at least one lab number must be requested",
        ));
    }
    let partition = LabPartition::new(category, year);
    let max = max_lab_sequence(records, partition);
    let count_u32 = u32::try_from(count)
        .map_err(|_| LabError::validation("count", format!("{count} is too many lab numbers")))?;
    let last = max
        .checked_add(count_u32)
        .ok_or(LabError::SequenceExhausted { year })?;
    debug!(
        partition = %partition.scan_prefix(),
        max,
        count,
        "allocating lab numbers"
    );
    ((max + 1)..=last)
        .map(|sequence| {
            LabNumber::new(partition.prefix, partition.year, sequence).map_err(LabError::from)
        })
        .collect()
}

/// Returns the next case number for `year` (`CASE_<yyyy>_<nnn>`).
pub fn next_case_number(records: &Records, year: i32) -> Result<CaseNumber> {
    let full_year = u16::try_from(year)
        .ok()
        .filter(|y| (1000..=9999).contains(y))
        .ok_or_else(|| LabError::validation("year", format!("{year} is not a four-digit year")))?;
    let prefix = CaseNumber::year_prefix(full_year);
    let max = records
        .case_numbers_with_prefix(&prefix)
        .filter_map(|number| number.strip_prefix(prefix.as_str()))
        .filter_map(|sequence| sequence.parse::<u16>().ok())
        .max()
        .unwrap_or(0);
    if max >= CaseNumber::MAX_SEQUENCE {
        return Err(LabError::SequenceExhausted { year });
    }
    debug!(year, max, "allocating case number");
    CaseNumber::new(full_year, max + 1).map_err(LabError::from)
}

fn sequence_after_first_underscore(number: &str) -> Option<u32> {
    let (_, sequence) = number.split_once('_')?;
    sequence.parse().ok()
}
