//! Presentation helpers for host UIs

pub mod indicator;

pub use indicator::{fill_width, label, tier_color, IndicatorState};
