use crate::scale::{InterlineScale, Scale};
use serde::{Deserialize, Serialize};

/// Options of the staff-line retrieval around the clustering engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LinesOptions {
    /// Ratio of longest filaments used to estimate the global slope.
    pub top_ratio_for_slope: f64,
    /// Maximum central rotation of a filament, in radians.
    pub max_filament_rotation: f64,
    /// Maximum slope difference between a filament and the sheet.
    pub max_slope_diff: f64,
    /// Slope magnitude below which the sheet is considered not skewed.
    pub min_slope: f64,
    /// Minimum filament length (interline fraction) for a strict slope check.
    pub min_length_for_slope_check: f64,
    /// Minimum count of filaments for a sheet to contain staff lines.
    pub min_filament_count: usize,
}

impl Default for LinesOptions {
    fn default() -> Self {
        Self {
            top_ratio_for_slope: 0.1,
            max_filament_rotation: 0.1,
            max_slope_diff: 0.025,
            min_slope: 0.0002,
            min_length_for_slope_check: 4.0,
            min_filament_count: 5,
        }
    }
}

/// Options of the clustering engine. Lengths are interline fractions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    /// Typical abscissa delta between two vertical samplings.
    pub sampling_dx: f64,
    /// Maximum dx to extrapolate a filament ordinate.
    pub max_extrapolation_dx: f64,
    /// Maximum dx to aggregate a filament to a cluster.
    pub max_expand_dx: f64,
    /// Maximum dy to aggregate a filament to a cluster.
    pub max_expand_dy: f64,
    /// Maximum dx to merge two clusters.
    pub max_merge_dx: f64,
    /// Maximum dy to merge two clusters.
    pub max_merge_dy: f64,
    /// Maximum center dy to merge two clusters of a pair.
    pub max_merge_center_dy: f64,
    /// Rough margin around a cluster ordinate.
    pub cluster_y_margin: f64,
    /// Comb margin below the minimum interline.
    pub comb_min_margin: f64,
    /// Comb margin above the maximum interline.
    pub comb_max_margin: f64,
    /// Minimum cluster true length, as ratio of the median true length.
    pub min_cluster_length_ratio: f64,
    /// Minimum outer line length of a 6-line cluster, as ratio of inner lines.
    pub min_cluster_tablature_length_ratio: f64,
    /// Maximum relative length difference of lines within a cluster.
    pub max_cluster_diff_length_ratio: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            sampling_dx: 1.0,
            max_extrapolation_dx: 6.0,
            max_expand_dx: 2.0,
            max_expand_dy: 0.175,
            max_merge_dx: 6.0,
            max_merge_dy: 0.4,
            max_merge_center_dy: 1.0,
            cluster_y_margin: 2.0,
            comb_min_margin: 0.0,
            comb_max_margin: 0.0,
            min_cluster_length_ratio: 0.2,
            min_cluster_tablature_length_ratio: 0.5,
            max_cluster_diff_length_ratio: 0.5,
        }
    }
}

/// Pixel values of [`ClusterOptions`] for one interline population.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ClusterParams {
    pub sampling_dx: i32,
    pub max_extrapolation_dx: i32,
    pub max_expand_dx: i32,
    pub max_expand_dy: i32,
    pub max_merge_dx: i32,
    pub max_merge_dy: i32,
    pub max_merge_center_dy: i32,
    pub cluster_y_margin: i32,
    pub comb_min_margin: i32,
    pub comb_max_margin: i32,
    pub min_cluster_length_ratio: f64,
    pub min_cluster_tablature_length_ratio: f64,
    pub max_cluster_diff_length_ratio: f64,
}

impl ClusterParams {
    pub fn new(options: &ClusterOptions, scale: &Scale, interline: &InterlineScale) -> Self {
        Self {
            sampling_dx: scale.to_pixels(options.sampling_dx).max(1),
            max_extrapolation_dx: scale.to_pixels(options.max_extrapolation_dx),
            max_expand_dx: scale.to_pixels(options.max_expand_dx),
            max_merge_dx: scale.to_pixels(options.max_merge_dx),
            max_expand_dy: interline.to_pixels(options.max_expand_dy),
            max_merge_dy: interline.to_pixels(options.max_merge_dy),
            max_merge_center_dy: interline.to_pixels(options.max_merge_center_dy),
            cluster_y_margin: interline.to_pixels(options.cluster_y_margin),
            comb_min_margin: interline.to_pixels(options.comb_min_margin),
            comb_max_margin: interline.to_pixels(options.comb_max_margin),
            min_cluster_length_ratio: options.min_cluster_length_ratio,
            min_cluster_tablature_length_ratio: options.min_cluster_tablature_length_ratio,
            max_cluster_diff_length_ratio: options.max_cluster_diff_length_ratio,
        }
    }
}
