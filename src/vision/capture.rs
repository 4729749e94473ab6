//! Region capture
//!
//! The host owns the rendered frame; the engine only asks it for a cropped
//! sub-region through [`CaptureSource`]. All requests go through a
//! [`CaptureGate`] because the underlying capture path is not safe to invoke
//! concurrently.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::pixel::{PixelBuffer, BYTES_PER_PIXEL};
use super::{CaptureError, VisionError};

/// A rectangle in the coordinate space of the captured view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRect {
    /// Create a rectangle
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if the rectangle lies entirely inside a frame of the given size
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && i64::from(self.x) + i64::from(self.width) <= i64::from(frame_width)
            && i64::from(self.y) + i64::from(self.height) <= i64::from(frame_height)
    }
}

impl std::fmt::Display for CaptureRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}) {}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Anything that can produce a pixel buffer of a sub-region of the current frame
pub trait CaptureSource: Send + Sync {
    /// Capture `rect` from the current frame
    fn capture_region(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError>;
}

/// Serializes all capture requests against one source
#[derive(Clone)]
pub struct CaptureGate {
    source: Arc<dyn CaptureSource>,
    lock: Arc<Mutex<()>>,
}

impl CaptureGate {
    /// Wrap a capture source
    pub fn new(source: Arc<dyn CaptureSource>) -> Self {
        Self {
            source,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Capture a region, blocking until no other capture is in flight
    pub fn capture(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.source.capture_region(rect)
    }
}

/// Copy a sub-rectangle out of a frame into a new, unpadded buffer
pub fn crop(frame: &PixelBuffer, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(CaptureError::EmptyRegion);
    }
    if !rect.fits_within(frame.width(), frame.height()) {
        return Err(CaptureError::OutOfBounds {
            rect,
            frame_width: frame.width(),
            frame_height: frame.height(),
        });
    }

    let x_start = rect.x as usize * BYTES_PER_PIXEL;
    let x_end = x_start + rect.width as usize * BYTES_PER_PIXEL;
    let mut data = Vec::with_capacity(rect.width as usize * rect.height as usize * BYTES_PER_PIXEL);

    for y in rect.y as u32..rect.y as u32 + rect.height {
        let row = frame
            .row(y)
            .and_then(|row| row.get(x_start..x_end))
            .ok_or(CaptureError::OutOfBounds {
                rect,
                frame_width: frame.width(),
                frame_height: frame.height(),
            })?;
        data.extend_from_slice(row);
    }

    let stride = rect.width as usize * BYTES_PER_PIXEL;
    PixelBuffer::new(rect.width, rect.height, stride, data).map_err(CaptureError::from)
}

#[derive(Default)]
struct FrameSlot {
    frame: Option<PixelBuffer>,
    frame_count: u64,
}

/// Holds the latest frame pushed by the host and crops regions out of it
#[derive(Default)]
pub struct FrameCapture {
    slot: Mutex<FrameSlot>,
}

impl FrameCapture {
    /// Create an empty capture (no frame yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame with raw BGRA bytes from the host
    pub fn update(
        &self,
        frame_data: &[u8],
        width: u32,
        height: u32,
        stride: usize,
    ) -> Result<(), VisionError> {
        let frame = PixelBuffer::new(width, height, stride, frame_data.to_vec())?;
        self.replace(frame);
        Ok(())
    }

    /// Replace the current frame with an already built buffer
    pub fn replace(&self, frame: PixelBuffer) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.frame = Some(frame);
        slot.frame_count += 1;
    }

    /// Drop the current frame, e.g. when the browser view navigates away
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.frame = None;
    }

    /// Check if a frame is available
    pub fn has_frame(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame
            .is_some()
    }

    /// Number of frames pushed so far
    pub fn frame_count(&self) -> u64 {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame_count
    }

    /// Dimensions of the current frame
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frame
            .as_ref()
            .map(|frame| (frame.width(), frame.height()))
    }
}

impl CaptureSource for FrameCapture {
    fn capture_region(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let frame = slot.frame.as_ref().ok_or(CaptureError::Unavailable)?;
        crop(frame, rect)
    }
}

/// Decodes a screenshot file on every request
///
/// Mirrors a browser preview capture: the whole view is encoded to an image
/// file, decoded, and the region cropped out of it.
pub struct PngFileCapture {
    path: PathBuf,
}

impl PngFileCapture {
    /// Capture from the image at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the screenshot being read
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureSource for PngFileCapture {
    fn capture_region(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
        if !self.path.exists() {
            return Err(CaptureError::Unavailable);
        }
        let image = image::open(&self.path)?.to_rgba8();
        let frame = PixelBuffer::from_rgba(&image);
        crop(&frame, rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::color::Rgb;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn gradient_frame(width: u32, height: u32) -> PixelBuffer {
        let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        PixelBuffer::from_rgba(&image)
    }

    #[test]
    fn test_rect_bounds() {
        assert!(CaptureRect::new(0, 0, 10, 10).fits_within(10, 10));
        assert!(!CaptureRect::new(1, 0, 10, 10).fits_within(10, 10));
        assert!(!CaptureRect::new(-1, 0, 5, 5).fits_within(10, 10));
        assert!(!CaptureRect::new(0, 8, 5, 5).fits_within(10, 10));
    }

    #[test]
    fn test_crop_copies_region() {
        let frame = gradient_frame(20, 10);
        let region = crop(&frame, CaptureRect::new(5, 2, 4, 3)).unwrap();

        assert_eq!(region.width(), 4);
        assert_eq!(region.height(), 3);
        assert_eq!(region.stride(), 16);
        assert_eq!(region.rgb(0, 0), Some(Rgb::new(5, 2, 0)));
        assert_eq!(region.rgb(3, 2), Some(Rgb::new(8, 4, 0)));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let frame = gradient_frame(20, 10);
        let result = crop(&frame, CaptureRect::new(15, 0, 10, 5));
        assert!(matches!(result, Err(CaptureError::OutOfBounds { .. })));

        let result = crop(&frame, CaptureRect::new(0, 0, 0, 5));
        assert!(matches!(result, Err(CaptureError::EmptyRegion)));
    }

    #[test]
    fn test_frame_capture_without_frame() {
        let capture = FrameCapture::new();
        assert!(!capture.has_frame());
        let result = capture.capture_region(CaptureRect::new(0, 0, 1, 1));
        assert!(matches!(result, Err(CaptureError::Unavailable)));
    }

    #[test]
    fn test_frame_capture_update() {
        let capture = FrameCapture::new();
        let frame_data = vec![255u8; 10 * 10 * 4];
        capture.update(&frame_data, 10, 10, 40).unwrap();

        assert!(capture.has_frame());
        assert_eq!(capture.frame_count(), 1);
        assert_eq!(capture.dimensions(), Some((10, 10)));

        let region = capture.capture_region(CaptureRect::new(2, 2, 3, 3)).unwrap();
        assert_eq!(region.as_bytes().len(), 36);

        capture.clear();
        assert!(!capture.has_frame());
    }

    #[test]
    fn test_frame_capture_rejects_bad_frame() {
        let capture = FrameCapture::new();
        let result = capture.update(&[0u8; 100], 10, 10, 40);
        assert!(result.is_err());
        assert!(!capture.has_frame());
    }

    #[test]
    fn test_png_capture_missing_file() {
        let capture = PngFileCapture::new("definitely/not/here.png");
        let result = capture.capture_region(CaptureRect::new(0, 0, 1, 1));
        assert!(matches!(result, Err(CaptureError::Unavailable)));
    }

    #[test]
    fn test_png_capture_reads_region() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbaImage::from_fn(12, 6, |x, y| Rgba([x as u8 * 10, y as u8 * 10, 7, 255]))
            .save(&path)
            .unwrap();

        let capture = PngFileCapture::new(&path);
        let region = capture.capture_region(CaptureRect::new(3, 1, 2, 2)).unwrap();
        assert_eq!(region.rgb(0, 0), Some(Rgb::new(30, 10, 7)));
        assert_eq!(region.rgb(1, 1), Some(Rgb::new(40, 20, 7)));
    }

    #[test]
    fn test_gate_forwards_to_source() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(gradient_frame(8, 8));
        let gate = CaptureGate::new(frames.clone());

        let region = gate.capture(CaptureRect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(region.rgb(0, 0), Some(Rgb::new(1, 1, 0)));
    }

    #[test]
    fn test_frame_capture_rejects_oversized_stride() {
        let capture = FrameCapture::new();
        let result = capture.update(&[0u8; 16], 1, 3, usize::MAX / 2);
        assert!(matches!(result, Err(VisionError::SizeOverflow { .. })));
        assert!(!capture.has_frame());
    }

    /// Tracks how many captures run at once
    struct CountingSource {
        frames: FrameCapture,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CaptureSource for CountingSource {
        fn capture_region(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            let result = self.frames.capture_region(rect);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[test]
    fn test_gate_admits_one_capture_at_a_time() {
        let frames = FrameCapture::new();
        frames.replace(gradient_frame(8, 8));
        let source = Arc::new(CountingSource {
            frames,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let gate = CaptureGate::new(source.clone());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || {
                    for _ in 0..5 {
                        gate.capture(CaptureRect::new(0, 0, 4, 4)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(source.peak.load(Ordering::SeqCst), 1);
    }
}
