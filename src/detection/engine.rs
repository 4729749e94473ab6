//! Single-bar detection cycle
//!
//! One cycle: validate the bar's region, capture it, scan it, update the
//! calibration and compute the percentage. The same code path serves both
//! bars; they differ only in their region and their calibration state.

use super::bar::{BarId, BarState, DetectionRegion, DetectionResult, BUFFER_HP_REGION};
use super::calibration::CalibrationStore;
use super::DetectionError;
use crate::vision::{CaptureGate, ColorSignature, ProcessingGate};

/// Receives results for presentation
pub trait ResultSink: Send + Sync {
    /// Called once per bar per completed cycle
    fn on_result(&self, bar: BarId, result: DetectionResult);
}

impl<F> ResultSink for F
where
    F: Fn(BarId, DetectionResult) + Send + Sync,
{
    fn on_result(&self, bar: BarId, result: DetectionResult) {
        self(bar, result)
    }
}

/// Runs detection cycles for the monitored bars
pub struct DetectionEngine {
    capture: CaptureGate,
    processing: ProcessingGate,
    signature: ColorSignature,
    regions: [DetectionRegion; 2],
    calibration: CalibrationStore,
}

impl DetectionEngine {
    /// Create an engine watching `main_region` and the fixed buffer HP region
    pub fn new(
        capture: CaptureGate,
        processing: ProcessingGate,
        signature: ColorSignature,
        main_region: DetectionRegion,
    ) -> Self {
        Self {
            capture,
            processing,
            signature,
            regions: [main_region, BUFFER_HP_REGION],
            calibration: CalibrationStore::new(),
        }
    }

    /// Region of a bar
    pub fn region(&self, bar: BarId) -> DetectionRegion {
        self.regions[bar.index()]
    }

    /// Move a bar's region. Calibration is kept.
    pub fn set_region(&mut self, bar: BarId, region: DetectionRegion) {
        self.regions[bar.index()] = region;
    }

    /// Signature used for scanning
    pub fn signature(&self) -> &ColorSignature {
        &self.signature
    }

    /// Replace the signature (e.g. after a tolerance change)
    pub fn set_signature(&mut self, signature: ColorSignature) {
        self.signature = signature;
    }

    /// State of one bar
    pub fn bar_state(&self, bar: BarId) -> &BarState {
        self.calibration.state(bar)
    }

    /// All calibration state
    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    /// Run one full cycle for `bar`.
    ///
    /// On error nothing about the bar changes, so the last displayed value
    /// stays as it was.
    pub fn run_cycle(&mut self, bar: BarId) -> Result<DetectionResult, DetectionError> {
        let region = self.region(bar);
        let rect = region.validate()?;

        let buffer = self.capture.capture(rect)?;
        let scan = self.processing.scan(&buffer, &self.signature);
        drop(buffer);

        let result = self.calibration.observe(bar, scan.width());
        log::debug!(
            "{}: width {} px of {} px -> {:.1}% ({})",
            bar,
            scan.width(),
            self.calibration.calibrated_max(bar),
            result.percentage,
            result.tier
        );
        Ok(result)
    }
}
