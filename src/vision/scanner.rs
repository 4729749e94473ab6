//! Bar width scanning
//!
//! Measures how wide the colored part of an HP bar is. Every row is scanned
//! for matching pixels and the per-row extents are unioned, so a row that is
//! partly occluded or anti-aliased does not shrink the result. Any stray
//! matching pixel inside the region widens it too, which is why regions must
//! be cropped tightly around the bar.

use std::sync::{Arc, Mutex, PoisonError};

use super::color::ColorSignature;
use super::pixel::{PixelBuffer, BYTES_PER_PIXEL};

/// Horizontal extent of the matching pixels in a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarSpan {
    /// Leftmost matching column across all rows
    pub leftmost: u32,
    /// Rightmost matching column across all rows
    pub rightmost: u32,
}

impl BarSpan {
    /// Width in pixels, both ends inclusive
    pub fn width(&self) -> u32 {
        self.rightmost - self.leftmost + 1
    }
}

/// Result of scanning one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanResult {
    /// Detected span, `None` when nothing usable matched
    pub span: Option<BarSpan>,
    /// Number of rows with at least one matching pixel
    pub matched_rows: u32,
}

impl ScanResult {
    /// Bar width in pixels (0 when no span was found)
    pub fn width(&self) -> u32 {
        self.span.map_or(0, |span| span.width())
    }
}

/// Scan a buffer for the bar described by `signature`.
///
/// A span is only reported when the rightmost match lies strictly right of
/// the leftmost one; a lone matching column yields width 0.
pub fn scan(buffer: &PixelBuffer, signature: &ColorSignature) -> ScanResult {
    let mut leftmost: Option<u32> = None;
    let mut rightmost: Option<u32> = None;
    let mut matched_rows = 0;

    for row in buffer.rows() {
        let mut local_left: Option<u32> = None;
        let mut local_right: Option<u32> = None;

        for (x, px) in row.chunks_exact(BYTES_PER_PIXEL).enumerate() {
            if signature.matches_bgra(px) {
                let x = x as u32;
                local_left.get_or_insert(x);
                local_right = Some(x);
            }
        }

        if let (Some(left), Some(right)) = (local_left, local_right) {
            matched_rows += 1;
            leftmost = Some(leftmost.map_or(left, |l| l.min(left)));
            rightmost = Some(rightmost.map_or(right, |r| r.max(right)));
        }
    }

    let span = match (leftmost, rightmost) {
        (Some(leftmost), Some(rightmost)) if rightmost > leftmost => Some(BarSpan {
            leftmost,
            rightmost,
        }),
        _ => None,
    };

    ScanResult { span, matched_rows }
}

/// Convenience wrapper returning only the width
pub fn scan_width(buffer: &PixelBuffer, signature: &ColorSignature) -> u32 {
    scan(buffer, signature).width()
}

/// Serializes buffer scans across every caller in the process
#[derive(Clone, Default)]
pub struct ProcessingGate {
    lock: Arc<Mutex<()>>,
}

impl ProcessingGate {
    /// Create a new gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the gate
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        f()
    }

    /// Scan a buffer, blocking until no other scan is running
    pub fn scan(&self, buffer: &PixelBuffer, signature: &ColorSignature) -> ScanResult {
        self.run(|| scan(buffer, signature))
    }
}
