//! Vision and pixel processing module
//!
//! Turns a captured screen region into an HP bar width: raw BGRA buffers,
//! color signature matching, the row-union width scanner, region capture,
//! and manual calibration snapshots.

pub mod capture;
pub mod color;
pub mod pixel;
pub mod scanner;
pub mod snapshot;

pub use capture::{CaptureGate, CaptureRect, CaptureSource, FrameCapture, PngFileCapture};
pub use color::{ColorSignature, Rgb, HP_BAR_SIGNATURE};
pub use pixel::PixelBuffer;
pub use scanner::{scan, BarSpan, ProcessingGate, ScanResult};
pub use snapshot::{capture_calibration_snapshot, SnapshotReport};

use crate::detection::RegionError;

/// Pixel buffer errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Row stride {stride} is shorter than a row ({row_bytes} bytes)")]
    InvalidStride { stride: usize, row_bytes: usize },
    #[error("Pixel buffer holds {actual} bytes, expected at least {required}")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("{height} rows of {stride} bytes do not fit in memory")]
    SizeOverflow { stride: usize, height: u32 },
}

/// Region capture errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Render surface is not ready")]
    Unavailable,
    #[error("Capture region is empty")]
    EmptyRegion,
    #[error("Region {rect} exceeds the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        rect: CaptureRect,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("Failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Buffer(#[from] VisionError),
}

/// Manual snapshot errors
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error("Failed to capture region: {0}")]
    Capture(#[from] CaptureError),
    #[error("Failed to create screenshot folder: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to save snapshot: {0}")]
    Image(#[from] image::ImageError),
}
