//! Color signature matching
//!
//! The HP bar is drawn with a handful of closely related reds (a vertical
//! gradient). A pixel counts as "bar" when it sits within a small per-channel
//! tolerance of any of them.

use serde::{Deserialize, Serialize};

/// An opaque RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a color from its channels
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Check if every channel is within `tolerance` of `other`
    #[inline]
    pub fn is_near(&self, other: &Rgb, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }

    /// `#RRGGBB` form
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Reference reds of the FlyFF HP bar gradient
pub const HP_BAR_REDS: [Rgb; 4] = [
    Rgb::new(174, 18, 55),
    Rgb::new(188, 24, 62),
    Rgb::new(204, 30, 70),
    Rgb::new(220, 36, 78),
];

/// Default per-channel tolerance
pub const DEFAULT_TOLERANCE: u8 = 2;

/// Signature shared by the main and buffer HP bars
pub const HP_BAR_SIGNATURE: ColorSignature = ColorSignature::new(&HP_BAR_REDS, DEFAULT_TOLERANCE);

/// A set of reference colors plus a per-channel tolerance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSignature {
    references: &'static [Rgb],
    tolerance: u8,
}

impl ColorSignature {
    /// Create a signature
    pub const fn new(references: &'static [Rgb], tolerance: u8) -> Self {
        Self {
            references,
            tolerance,
        }
    }

    /// Same references, different tolerance
    pub const fn with_tolerance(self, tolerance: u8) -> Self {
        Self {
            references: self.references,
            tolerance,
        }
    }

    /// Reference colors
    pub fn references(&self) -> &'static [Rgb] {
        self.references
    }

    /// Per-channel tolerance
    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    /// Check if a pixel matches any reference color
    #[inline]
    pub fn matches(&self, pixel: Rgb) -> bool {
        self.references
            .iter()
            .any(|reference| pixel.is_near(reference, self.tolerance))
    }

    /// Match a raw BGRA pixel without building an `Rgb` first
    #[inline]
    pub fn matches_bgra(&self, px: &[u8]) -> bool {
        match px {
            [b, g, r, ..] => self.matches(Rgb::new(*r, *g, *b)),
            _ => false,
        }
    }
}

impl Default for ColorSignature {
    fn default() -> Self {
        HP_BAR_SIGNATURE
    }
}

/// Check if a pixel matches a signature
#[inline]
pub fn matches(pixel: Rgb, signature: &ColorSignature) -> bool {
    signature.matches(pixel)
}
