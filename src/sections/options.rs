use crate::scale::Scale;
use serde::{Deserialize, Serialize};

/// Options of the run/section extraction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LagOptions {
    /// Minimum horizontal run length, as a fraction of interline.
    pub min_horizontal_run: f64,
    /// Maximum length ratio between two runs joined in one section.
    pub max_length_ratio: f64,
}

impl Default for LagOptions {
    fn default() -> Self {
        Self {
            min_horizontal_run: 1.0,
            max_length_ratio: 2.0,
        }
    }
}

/// Pixel-resolved lag parameters.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LagParams {
    pub min_horizontal_run: i32,
    pub min_vertical_run: i32,
    pub max_length_ratio: f64,
}

impl LagParams {
    pub fn new(options: &LagOptions, scale: &Scale) -> Self {
        Self {
            min_horizontal_run: scale.to_pixels(options.min_horizontal_run).max(1),
            min_vertical_run: scale.max_line_thickness + 1,
            max_length_ratio: options.max_length_ratio.max(1.0),
        }
    }
}
