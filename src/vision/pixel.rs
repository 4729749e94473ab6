//! Raw pixel buffers
//!
//! A captured region is handed to the engine as tightly packed 32-bit BGRA
//! rows. Rows may carry alignment padding, so every access goes through the
//! row stride rather than `width * 4`.

use image::{Rgba, RgbaImage};

use super::color::Rgb;
use super::VisionError;

/// Bytes per pixel in a captured buffer (blue, green, red, alpha)
pub const BYTES_PER_PIXEL: usize = 4;

/// Bytes needed for `height` rows of `stride` bytes
fn required_len(stride: usize, height: u32) -> Result<usize, VisionError> {
    stride
        .checked_mul(height as usize)
        .ok_or(VisionError::SizeOverflow { stride, height })
}

/// A rectangular BGRA pixel buffer with an explicit row stride
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw BGRA bytes.
    ///
    /// Fails when the stride cannot hold a full row or the data is shorter
    /// than `stride * height`.
    pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Result<Self, VisionError> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(VisionError::InvalidStride { stride, row_bytes });
        }

        let required = required_len(stride, height)?;
        if data.len() < required {
            return Err(VisionError::BufferTooSmall {
                required,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Create a zeroed (fully transparent black) buffer
    pub fn blank(width: u32, height: u32, stride: usize) -> Result<Self, VisionError> {
        let data = vec![0u8; required_len(stride, height)?];
        Self::new(width, height, stride, data)
    }

    /// Convert an RGBA image into a packed BGRA buffer (no row padding)
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
        for pixel in image.pixels() {
            let [r, g, b, a] = pixel.0;
            data.extend_from_slice(&[b, g, r, a]);
        }

        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
            data,
        }
    }

    /// Convert back to an RGBA image (drops row padding)
    pub fn to_rgba(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let [b, g, r, a] = self.bgra(x, y).unwrap_or([0, 0, 0, 0]);
            Rgba([r, g, b, a])
        })
    }

    /// Buffer width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Buffer height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row including padding
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw bytes, including row padding
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel bytes of one row without its padding.
    ///
    /// Returns `None` for rows outside the buffer.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        let end = start + self.width as usize * BYTES_PER_PIXEL;
        self.data.get(start..end)
    }

    /// Iterate over every row in top-to-bottom order
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.height).filter_map(move |y| self.row(y))
    }

    /// Raw BGRA bytes of a single pixel
    pub fn bgra(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width {
            return None;
        }
        let offset = x as usize * BYTES_PER_PIXEL;
        let px = self.row(y)?.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Color of a single pixel, alpha ignored
    pub fn rgb(&self, x: u32, y: u32) -> Option<Rgb> {
        self.bgra(x, y).map(|[b, g, r, _]| Rgb::new(r, g, b))
    }

    /// Overwrite a single pixel. Out-of-range coordinates are ignored.
    pub fn put_rgb(&mut self, x: u32, y: u32, color: Rgb) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        if let Some(px) = self.data.get_mut(offset..offset + BYTES_PER_PIXEL) {
            px.copy_from_slice(&[color.b, color.g, color.r, 255]);
        }
    }

    /// Fill a horizontal run `[x_start, x_end]` of one row
    pub fn fill_row_span(&mut self, y: u32, x_start: u32, x_end: u32, color: Rgb) {
        for x in x_start..=x_end {
            self.put_rgb(x, y, color);
        }
    }
}
