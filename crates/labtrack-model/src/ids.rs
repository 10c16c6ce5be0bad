//! Identifiers: surrogate record ids and the human-readable numbers printed on
//! tubes, forms and plates.
//!
//! The persisted grammars are fixed because other systems match on them:
//!
//! - lab number: `^(LT)?\d{2}_\d+$` (e.g. `25_14`, `LT25_3`)
//! - case number: `^CASE_\d{4}_\d{3}$` (e.g. `CASE_2025_001`)
//!
//! Lab numbers are partitioned by two-digit year, case numbers by four-digit
//! year. Both conventions are kept as they are.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }

            /// The id following this one.
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id!(
    /// Surrogate key of a case record.
    CaseId
);
record_id!(
    /// Surrogate key of a sample record.
    SampleId
);
record_id!(
    /// Surrogate key of a batch record.
    BatchId
);

/// Prefix that partitions lab numbers by client category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabPrefix {
    /// No prefix (paternity, urgent, peace of mind).
    None,
    /// `LT`, used for legal cases.
    Legal,
}

impl LabPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabPrefix::None => "",
            LabPrefix::Legal => "LT",
        }
    }
}

/// A sample lab number such as `25_14` or `LT25_3`.
///
/// Parsing normalizes the sequence (`25_007` becomes `25_7`), so two numbers are
/// equal exactly when they name the same slot in a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabNumber {
    prefix: LabPrefix,
    year: u8,
    sequence: u32,
}

impl LabNumber {
    pub fn new(prefix: LabPrefix, year: u8, sequence: u32) -> Result<Self, ModelError> {
        if year > 99 {
            return Err(ModelError::InvalidLabNumber(format!(
                "{}{}_{}",
                prefix.as_str(),
                year,
                sequence
            )));
        }
        Ok(Self {
            prefix,
            year,
            sequence,
        })
    }

    pub fn prefix(&self) -> LabPrefix {
        self.prefix
    }

    /// Two-digit year of the partition.
    pub fn year(&self) -> u8 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// String every lab number of this partition starts with, e.g. `LT25_`.
    pub fn partition_prefix(prefix: LabPrefix, year: u8) -> String {
        format!("{}{:02}_", prefix.as_str(), year)
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidLabNumber(value.to_string());
        let trimmed = value.trim();
        let (prefix, rest) = match trimmed.strip_prefix("LT") {
            Some(rest) => (LabPrefix::Legal, rest),
            None => (LabPrefix::None, trimmed),
        };
        let (year, sequence) = rest.split_once('_').ok_or_else(invalid)?;
        if year.len() != 2 || !is_digits(year) || !is_digits(sequence) {
            return Err(invalid());
        }
        let year = year.parse::<u8>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u32>().map_err(|_| invalid())?;
        Self::new(prefix, year, sequence)
    }
}

impl fmt::Display for LabNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:02}_{}",
            self.prefix.as_str(),
            self.year,
            self.sequence
        )
    }
}

impl FromStr for LabNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LabNumber {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LabNumber> for String {
    fn from(value: LabNumber) -> Self {
        value.to_string()
    }
}

/// A case number such as `CASE_2025_001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CaseNumber {
    year: u16,
    sequence: u16,
}

impl CaseNumber {
    /// Highest sequence the three-digit grammar can express.
    pub const MAX_SEQUENCE: u16 = 999;

    pub fn new(year: u16, sequence: u16) -> Result<Self, ModelError> {
        if !(1000..=9999).contains(&year) || sequence > Self::MAX_SEQUENCE {
            return Err(ModelError::InvalidCaseNumber(format!(
                "CASE_{year}_{sequence:03}"
            )));
        }
        Ok(Self { year, sequence })
    }

    pub fn year(&self) -> u16 {
        self.year
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    /// String every case number of a year starts with, e.g. `CASE_2025_`.
    pub fn year_prefix(year: u16) -> String {
        format!("CASE_{year}_")
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        let invalid = || ModelError::InvalidCaseNumber(value.to_string());
        let rest = value.trim().strip_prefix("CASE_").ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('_').ok_or_else(invalid)?;
        if year.len() != 4 || sequence.len() != 3 || !is_digits(year) || !is_digits(sequence) {
            return Err(invalid());
        }
        let year = year.parse::<u16>().map_err(|_| invalid())?;
        let sequence = sequence.parse::<u16>().map_err(|_| invalid())?;
        Self::new(year, sequence).map_err(|_| invalid())
    }
}

impl fmt::Display for CaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CASE_{}_{:03}", self.year, self.sequence)
    }
}

impl FromStr for CaseNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CaseNumber {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CaseNumber> for String {
    fn from(value: CaseNumber) -> Self {
        value.to_string()
    }
}

/// Suffix marking a rerun batch.
pub const RERUN_SUFFIX: &str = "_RR";

/// A batch number. Free-form apart from being non-empty and whitespace-free;
/// the `_RR` suffix marks a rerun batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchNumber(String);

impl BatchNumber {
    pub fn new(value: impl Into<String>) -> Result<Self, ModelError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(ModelError::InvalidBatchNumber(value));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_rerun(&self) -> bool {
        self.0.ends_with(RERUN_SUFFIX)
    }
}

impl fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BatchNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BatchNumber {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatchNumber> for String {
    fn from(value: BatchNumber) -> Self {
        value.0
    }
}

fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
