//! HP bar detection
//!
//! Per-bar state and calibration, the percentage/tier policy, the single-bar
//! detection cycle, and the scheduler that runs it periodically.

pub mod bar;
pub mod calibration;
pub mod engine;
pub mod percentage;
pub mod scheduler;

pub use bar::{BarId, BarState, DetectionRegion, DetectionResult, BUFFER_HP_REGION};
pub use calibration::CalibrationStore;
pub use engine::{DetectionEngine, ResultSink};
pub use percentage::{percentage, Tier};
pub use scheduler::{DetectionScheduler, SchedulerState, SchedulerStats, TickOutcome};

use crate::vision::CaptureError;

/// A region that cannot be captured
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error("Invalid HP region: {0}")]
    Inverted(DetectionRegion),
}

/// Reasons a bar's cycle produced no result
#[derive(Debug, thiserror::Error)]
pub enum DetectionError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("Failed to capture region: {0}")]
    Capture(#[from] CaptureError),
    #[error("Detection panicked: {0}")]
    Panicked(String),
}
