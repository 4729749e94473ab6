//! Width ratio to percentage conversion and severity tiers

use serde::{Deserialize, Serialize};

/// Lower bound (inclusive) of the healthy tier
pub const HEALTHY_THRESHOLD: f64 = 70.0;
/// Lower bound (inclusive) of the caution tier
pub const CAUTION_THRESHOLD: f64 = 40.0;
/// Lower bound (inclusive) of the warning tier
pub const WARNING_THRESHOLD: f64 = 20.0;

/// Convert an observed bar width into a fill percentage.
///
/// No matching pixels means the bar is empty. An uncalibrated bar treats
/// its first sighting as full. Anything above the calibration clamps to 100.
pub fn percentage(observed_width: u32, calibrated_max_width: u32) -> f64 {
    if observed_width == 0 {
        return 0.0;
    }
    if calibrated_max_width == 0 {
        return 100.0;
    }

    let ratio = f64::from(observed_width) / f64::from(calibrated_max_width) * 100.0;
    clamp_percentage(ratio)
}

/// Clamp into `[0, 100]`, mapping NaN to 0
pub fn clamp_percentage(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Severity bucket used for coloring the indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// 70% and above
    Healthy,
    /// 40% up to 70%
    Caution,
    /// 20% up to 40%
    Warning,
    /// Below 20%
    Critical,
}

impl Tier {
    /// Bucket a percentage
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= HEALTHY_THRESHOLD {
            Tier::Healthy
        } else if percentage >= CAUTION_THRESHOLD {
            Tier::Caution
        } else if percentage >= WARNING_THRESHOLD {
            Tier::Warning
        } else {
            Tier::Critical
        }
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Tier::Healthy => "healthy",
            Tier::Caution => "caution",
            Tier::Warning => "warning",
            Tier::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
