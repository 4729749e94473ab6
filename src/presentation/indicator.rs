//! HP indicator model
//!
//! Turns a detection result into what a host UI draws: a filled track, a
//! percentage label and a tier color.

use crate::detection::{DetectionResult, Tier};
use crate::vision::Rgb;

/// Healthy: green
pub const HEALTHY_COLOR: Rgb = Rgb::new(72, 187, 120);
/// Caution: orange
pub const CAUTION_COLOR: Rgb = Rgb::new(237, 137, 54);
/// Warning: light red
pub const WARNING_COLOR: Rgb = Rgb::new(245, 101, 101);
/// Critical: dark red
pub const CRITICAL_COLOR: Rgb = Rgb::new(229, 62, 62);

/// Fill color of a tier
pub fn tier_color(tier: Tier) -> Rgb {
    match tier {
        Tier::Healthy => HEALTHY_COLOR,
        Tier::Caution => CAUTION_COLOR,
        Tier::Warning => WARNING_COLOR,
        Tier::Critical => CRITICAL_COLOR,
    }
}

/// Width of the filled part of a track.
///
/// `None` when the track has no width yet (not laid out); the host should
/// keep whatever it drew last. A non-empty bar is at least 1 unit wide but
/// never wider than the track.
pub fn fill_width(percentage: f64, track_width: f64) -> Option<f64> {
    if track_width.is_nan() || track_width <= 0.0 {
        return None;
    }
    if percentage.is_nan() || percentage <= 0.0 {
        return Some(0.0);
    }
    let target = track_width * (percentage.min(100.0) / 100.0);
    Some(target.max(1.0).min(track_width))
}

/// Label text, truncated to a whole percent
pub fn label(percentage: f64) -> String {
    format!("{}%", percentage.clamp(0.0, 100.0) as u32)
}

/// Everything needed to draw one bar
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorState {
    pub fill_width: Option<f64>,
    pub label: String,
    pub color: Rgb,
    pub tier: Tier,
}

impl IndicatorState {
    /// Build the indicator for a result on a track `track_width` wide
    pub fn from_result(result: &DetectionResult, track_width: f64) -> Self {
        Self {
            fill_width: fill_width(result.percentage, track_width),
            label: label(result.percentage),
            color: tier_color(result.tier),
            tier: result.tier,
        }
    }

    /// Render as a fixed-width text bar, e.g. `[#####-----]  50%`
    pub fn render_text(&self, cells: usize) -> String {
        let filled = self
            .fill_width
            .map(|w| (w.round() as usize).min(cells))
            .unwrap_or(0);
        format!(
            "[{}{}] {:>4}",
            "#".repeat(filled),
            "-".repeat(cells - filled),
            self.label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hides_bar() {
        assert_eq!(fill_width(0.0, 200.0), Some(0.0));
    }

    #[test]
    fn test_tiny_percentage_stays_visible() {
        assert_eq!(fill_width(0.1, 200.0), Some(1.0));
        assert_eq!(fill_width(50.0, 200.0), Some(100.0));
        assert_eq!(fill_width(100.0, 200.0), Some(200.0));
    }

    #[test]
    fn test_fill_never_exceeds_narrow_track() {
        assert_eq!(fill_width(50.0, 0.5), Some(0.5));
        assert_eq!(fill_width(100.0, 0.25), Some(0.25));
        assert_eq!(fill_width(0.0, 0.5), Some(0.0));
    }

    #[test]
    fn test_unlaid_track_is_not_updated() {
        assert_eq!(fill_width(50.0, 0.0), None);
        assert_eq!(fill_width(50.0, -3.0), None);
    }

    #[test]
    fn test_label_truncates() {
        assert_eq!(label(99.9), "99%");
        assert_eq!(label(100.0), "100%");
        assert_eq!(label(0.4), "0%");
    }

    #[test]
    fn test_palette() {
        assert_eq!(tier_color(Tier::Healthy).to_hex(), "#48BB78");
        assert_eq!(tier_color(Tier::Caution).to_hex(), "#ED8936");
        assert_eq!(tier_color(Tier::Warning).to_hex(), "#F56565");
        assert_eq!(tier_color(Tier::Critical).to_hex(), "#E53E3E");
    }

    #[test]
    fn test_from_result() {
        let state = IndicatorState::from_result(&DetectionResult::new(45.0), 100.0);
        assert_eq!(state.fill_width, Some(45.0));
        assert_eq!(state.label, "45%");
        assert_eq!(state.tier, Tier::Caution);
        assert_eq!(state.color, CAUTION_COLOR);
    }

    #[test]
    fn test_render_text() {
        let state = IndicatorState::from_result(&DetectionResult::new(50.0), 10.0);
        assert_eq!(state.render_text(10), "[#####-----]  50%");

        let empty = IndicatorState::from_result(&DetectionResult::new(0.0), 10.0);
        assert_eq!(empty.render_text(10), "[----------]   0%");
    }
}
