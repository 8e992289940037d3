use crate::scale::Scale;
use serde::{Deserialize, Serialize};

/// Options of the staff-line filament factory.
///
/// Lengths are fractions of interline, thickness ratios are relative to the
/// typical line thickness.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilamentOptions {
    /// Distance between two polyline samples.
    pub segment_length: f64,
    /// Minimum length of a section used as filament seed.
    pub min_section_length: f64,
    /// Maximum thickness of a seed section, relative to line thickness.
    pub max_section_thickness_ratio: f64,
    /// Maximum abscissa gap bridged when joining two filaments.
    pub max_gap: f64,
    /// Maximum ordinate difference at the junction of two filaments.
    pub max_junction_dy: f64,
    /// Minimum length of a resulting filament.
    pub min_filament_length: f64,
}

impl Default for FilamentOptions {
    fn default() -> Self {
        Self {
            segment_length: 1.0,
            min_section_length: 1.0,
            max_section_thickness_ratio: 2.0,
            max_gap: 1.5,
            max_junction_dy: 0.2,
            min_filament_length: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct FilamentParams {
    pub step: i32,
    pub min_section_length: i32,
    pub max_thickness: i32,
    pub max_gap: i32,
    pub max_junction_dy: f64,
    pub min_filament_length: i32,
}

impl FilamentParams {
    pub fn new(options: &FilamentOptions, scale: &Scale) -> Self {
        let ratio_thickness = (options.max_section_thickness_ratio * scale.line_thickness).ceil() as i32;
        Self {
            step: scale.to_pixels(options.segment_length).max(1),
            min_section_length: scale.to_pixels(options.min_section_length).max(1),
            max_thickness: ratio_thickness.max(scale.max_line_thickness),
            max_gap: scale.to_pixels(options.max_gap),
            max_junction_dy: scale.to_pixels_f(options.max_junction_dy),
            min_filament_length: scale.to_pixels(options.min_filament_length),
        }
    }
}
