//! User settings
//!
//! Persisted as JSON. Every field has a default so older or hand-edited
//! files still load.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::detection::DetectionRegion;
use crate::vision::color::DEFAULT_TOLERANCE;
use crate::vision::{ColorSignature, HP_BAR_SIGNATURE};

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Location of the character HP bar
    pub hp_region: RegionSettings,
    /// Detection timing and matching
    pub detection: DetectionSettings,
    /// Where calibration snapshots are written
    pub screenshot_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hp_region: RegionSettings::default(),
            detection: DetectionSettings::default(),
            screenshot_dir: PathBuf::from("Screenshots"),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load settings, falling back to defaults if the file is missing or broken
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(
                    "Failed to load settings from {}: {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Validate and write settings as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("Settings saved to {}", path.display());
        Ok(())
    }

    /// Check that the HP region is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = self.main_region();
        if !region.is_valid() {
            return Err(ConfigError::InvalidRange(region));
        }
        Ok(())
    }

    /// HP region as a detection region
    pub fn main_region(&self) -> DetectionRegion {
        self.hp_region.to_region()
    }

    /// HP bar signature with the configured tolerance
    pub fn signature(&self) -> ColorSignature {
        HP_BAR_SIGNATURE.with_tolerance(self.detection.tolerance)
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.detection.interval_ms)
    }
}

/// Corners of the character HP bar in view coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionSettings {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl RegionSettings {
    /// Convert to a detection region
    pub fn to_region(&self) -> DetectionRegion {
        DetectionRegion::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl From<DetectionRegion> for RegionSettings {
    fn from(region: DetectionRegion) -> Self {
        Self {
            min_x: region.min_x,
            max_x: region.max_x,
            min_y: region.min_y,
            max_y: region.max_y,
        }
    }
}

/// Detection timing and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Polling interval (ms)
    pub interval_ms: u64,
    /// Per-channel color tolerance
    pub tolerance: u8,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}
