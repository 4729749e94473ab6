//! Configuration module
//!
//! Handles the persisted HP region and detection preferences.

pub mod settings;

pub use settings::{DetectionSettings, RegionSettings, Settings};

use crate::detection::DetectionRegion;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings JSON error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid HP region {0}: min values must be less than max values")]
    InvalidRange(DetectionRegion),
}
