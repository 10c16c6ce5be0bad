//! `labtrack.toml` configuration.
//!
//! ```toml
//! [store]
//! path = "labtrack.json"
//!
//! [plate]
//! rows = 8
//! columns = 12
//!
//! [plate.controls]
//! allelic_ladder = "A01"
//! negative_control = "H11"
//! positive_control = "H12"
//! blanks = []
//! ```
//!
//! Every key is optional. Without a `[plate.controls]` table the conventional
//! template is scaled to the configured geometry; with one, only the controls
//! it names are reserved.

use std::path::{Path, PathBuf};

use labtrack_model::{ControlType, PlateGeometry, WellPosition};
use serde::{Deserialize, Serialize};

use crate::allocator::{self, ControlPlacement};

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "labtrack.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabConfig {
    pub store: StoreConfig,
    pub plate: PlateConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("labtrack.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlateConfig {
    pub rows: u8,
    pub columns: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<ControlDefaults>,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            rows: PlateGeometry::STANDARD_96.rows(),
            columns: PlateGeometry::STANDARD_96.columns(),
            controls: None,
        }
    }
}

/// Control positions as written in the file. An omitted key reserves no well
/// for that control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlDefaults {
    pub allelic_ladder: Option<String>,
    pub negative_control: Option<String>,
    pub positive_control: Option<String>,
    pub blanks: Vec<String>,
}

impl LabConfig {
    /// Reads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: LabConfig = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Parses and validates config text; used by tests and embedders.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: LabConfig = toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_controls().map(|_| ())
    }

    pub fn geometry(&self) -> Result<PlateGeometry, ConfigError> {
        PlateGeometry::new(self.plate.rows, self.plate.columns)
            .map_err(|e| ConfigError::invalid("plate", e.to_string()))
    }

    /// Control template for new plates, checked against the geometry.
    pub fn default_controls(&self) -> Result<Vec<ControlPlacement>, ConfigError> {
        let geometry = self.geometry()?;
        let Some(defaults) = &self.plate.controls else {
            return Ok(allocator::standard_controls(geometry));
        };

        let mut entries: Vec<(String, ControlType, &str)> = Vec::new();
        let singles = [
            ("allelic_ladder", ControlType::AllelicLadder, &defaults.allelic_ladder),
            ("negative_control", ControlType::NegativeControl, &defaults.negative_control),
            ("positive_control", ControlType::PositiveControl, &defaults.positive_control),
        ];
        for (field, control, value) in singles {
            if let Some(value) = value {
                entries.push((format!("plate.controls.{field}"), control, value.as_str()));
            }
        }
        for (index, value) in defaults.blanks.iter().enumerate() {
            entries.push((
                format!("plate.controls.blanks[{index}]"),
                ControlType::Blank,
                value.as_str(),
            ));
        }

        let mut placements: Vec<ControlPlacement> = Vec::with_capacity(entries.len());
        for (field, control, value) in entries {
            let position: WellPosition = geometry
                .parse_position(value)
                .map_err(|e| ConfigError::invalid(field.as_str(), e.to_string()))?;
            if placements.iter().any(|p| p.position == position) {
                return Err(ConfigError::invalid(
                    field,
                    format!("{position} is already reserved by another control"),
                ));
            }
            placements.push(ControlPlacement::new(control, position));
        }
        Ok(placements)
    }
}
