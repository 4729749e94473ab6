//! Per-bar calibration store
//!
//! Nothing tells us how many pixels make up a full bar, so the widest bar
//! ever observed is taken as 100%. The maximum only ever grows and is kept
//! for the lifetime of the process.

use super::bar::{BarId, BarState, DetectionResult};

/// Calibration and last reading for every monitored bar
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    bars: [BarState; 2],
}

impl CalibrationStore {
    /// Create an uncalibrated store
    pub fn new() -> Self {
        Self {
            bars: BarId::ALL.map(BarState::new),
        }
    }

    /// Record an observed width. Returns the calibrated maximum afterwards.
    pub fn update(&mut self, bar: BarId, observed_width: u32) -> u32 {
        self.state_mut(bar).calibrate(observed_width)
    }

    /// Record an observed width and compute the result to display
    pub fn observe(&mut self, bar: BarId, observed_width: u32) -> DetectionResult {
        self.state_mut(bar).observe(observed_width)
    }

    /// Current calibrated maximum of a bar (0 when uncalibrated)
    pub fn calibrated_max(&self, bar: BarId) -> u32 {
        self.state(bar).calibrated_max_width
    }

    /// State of one bar
    pub fn state(&self, bar: BarId) -> &BarState {
        &self.bars[bar.index()]
    }

    fn state_mut(&mut self, bar: BarId) -> &mut BarState {
        &mut self.bars[bar.index()]
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}
