//! Manual calibration snapshots
//!
//! Lets the user grab the configured HP region on demand to check that the
//! crop is tight around the bar. The capture goes through the same gate as
//! the periodic detection so the two never read the frame at the same time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use image::Rgba;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::capture::CaptureGate;
use super::color::ColorSignature;
use super::scanner::{ProcessingGate, ScanResult};
use super::SnapshotError;
use crate::detection::DetectionRegion;

/// Outline color for the detected span in the marked copy
const MARKER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);

/// Outcome of a manual snapshot
#[derive(Debug, Clone)]
pub struct SnapshotReport {
    /// Saved region image
    pub path: PathBuf,
    /// Copy with the detected span outlined, if a span was found
    pub marked_path: Option<PathBuf>,
    /// Captured width in pixels
    pub width: u32,
    /// Captured height in pixels
    pub height: u32,
    /// What the scanner saw in the captured region
    pub scan: ScanResult,
}

/// File name used for a snapshot taken at `timestamp`
pub fn snapshot_file_name(timestamp: &DateTime<Local>) -> String {
    format!("HP_Region_{}.png", timestamp.format("%Y-%m-%d_%H%M%S"))
}

/// Capture `region`, save it under `dir`, and report what the scanner finds in it
pub fn capture_calibration_snapshot(
    capture: &CaptureGate,
    processing: &ProcessingGate,
    signature: &ColorSignature,
    region: &DetectionRegion,
    dir: &Path,
) -> Result<SnapshotReport, SnapshotError> {
    let rect = region.validate()?;
    let buffer = capture.capture(rect)?;
    let scan = processing.scan(&buffer, signature);

    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(&Local::now()));
    let mut image = buffer.to_rgba();
    image.save(&path)?;
    log::info!(
        "Saved {}x{} HP region snapshot to {}",
        rect.width,
        rect.height,
        path.display()
    );

    let marked_path = match scan.span {
        Some(span) => {
            let outline = Rect::at(span.leftmost as i32, 0).of_size(span.width(), image.height());
            draw_hollow_rect_mut(&mut image, outline, MARKER_COLOR);
            let marked = path.with_file_name(format!(
                "{}_marked.png",
                path.file_stem().and_then(|s| s.to_str()).unwrap_or("HP_Region")
            ));
            image.save(&marked)?;
            Some(marked)
        }
        None => {
            log::warn!("No HP bar pixels found in the snapshot region");
            None
        }
    };

    Ok(SnapshotReport {
        path,
        marked_path,
        width: rect.width,
        height: rect.height,
        scan,
    })
}
