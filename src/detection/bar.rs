//! Monitored bars and their per-bar state

use serde::{Deserialize, Serialize};

use super::percentage::{clamp_percentage, percentage, Tier};
use super::RegionError;
use crate::vision::CaptureRect;

/// Which HP bar is being monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarId {
    /// The character's own HP bar
    Main,
    /// The secondary "buffer" HP effect bar
    Buffer,
}

impl BarId {
    /// Every bar, in the order a detection cycle visits them
    pub const ALL: [BarId; 2] = [BarId::Main, BarId::Buffer];

    /// Stable index for per-bar arrays
    pub fn index(&self) -> usize {
        match self {
            BarId::Main => 0,
            BarId::Buffer => 1,
        }
    }

    /// Human readable name
    pub fn name(&self) -> &'static str {
        match self {
            BarId::Main => "Character HP",
            BarId::Buffer => "Buffer HP",
        }
    }
}

impl std::fmt::Display for BarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A rectangular bar location in view coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRegion {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

/// Fixed location of the buffer HP bar
pub const BUFFER_HP_REGION: DetectionRegion = DetectionRegion {
    min_x: 111,
    min_y: 34,
    max_x: 216,
    max_y: 47,
};

impl DetectionRegion {
    /// Create a region from its corners
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check the `min < max` invariant on both axes
    pub fn is_valid(&self) -> bool {
        self.min_x < self.max_x && self.min_y < self.max_y
    }

    /// Validate and turn into a capture rectangle
    pub fn validate(&self) -> Result<CaptureRect, RegionError> {
        if !self.is_valid() {
            return Err(RegionError::Inverted(*self));
        }
        // The difference of two i32 values with min < max always fits in u32
        let width = (i64::from(self.max_x) - i64::from(self.min_x)) as u32;
        let height = (i64::from(self.max_y) - i64::from(self.min_y)) as u32;
        Ok(CaptureRect::new(self.min_x, self.min_y, width, height))
    }
}

impl std::fmt::Display for DetectionRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{}) to ({},{})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

/// What presentation receives for one bar after a cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Fill level in `[0, 100]`
    pub percentage: f64,
    /// Severity bucket of `percentage`
    pub tier: Tier,
}

impl DetectionResult {
    /// Build a result, clamping the percentage
    pub fn new(percentage: f64) -> Self {
        let percentage = clamp_percentage(percentage);
        Self {
            percentage,
            tier: Tier::from_percentage(percentage),
        }
    }
}

/// Calibration and last reading of one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarState {
    pub id: BarId,
    /// Widest bar ever seen; treated as 100%. Zero means uncalibrated.
    pub calibrated_max_width: u32,
    /// Last computed percentage
    pub last_percentage: f64,
    /// Width from the last scan
    pub last_width: u32,
    /// Number of completed cycles for this bar
    pub samples: u64,
}

impl BarState {
    /// Fresh, uncalibrated state
    pub fn new(id: BarId) -> Self {
        Self {
            id,
            calibrated_max_width: 0,
            last_percentage: 0.0,
            last_width: 0,
            samples: 0,
        }
    }

    /// Check if any width has been observed yet
    pub fn is_calibrated(&self) -> bool {
        self.calibrated_max_width > 0
    }

    /// Raise the calibration if `observed_width` is wider. Returns the current max.
    pub fn calibrate(&mut self, observed_width: u32) -> u32 {
        if observed_width > self.calibrated_max_width {
            if self.calibrated_max_width > 0 {
                log::debug!(
                    "{} calibration widened from {} to {} px",
                    self.id,
                    self.calibrated_max_width,
                    observed_width
                );
            } else {
                log::info!("{} calibrated at {} px", self.id, observed_width);
            }
            self.calibrated_max_width = observed_width;
        }
        self.calibrated_max_width
    }

    /// Fold a scanned width into the state and produce the result to display.
    ///
    /// Calibration is updated before the percentage is computed, so a new
    /// widest bar reads as 100% in the same cycle it is discovered.
    pub fn observe(&mut self, observed_width: u32) -> DetectionResult {
        let calibrated = self.calibrate(observed_width);
        let result = DetectionResult::new(percentage(observed_width, calibrated));
        self.last_width = observed_width;
        self.last_percentage = result.percentage;
        self.samples += 1;
        result
    }
}
