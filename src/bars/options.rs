use crate::scale::{InterlineScale, Scale};
use serde::{Deserialize, Serialize};

/// Options of the per-staff projection analysis.
///
/// Lengths are interline fractions. The three thresholds marked "specific"
/// use the interline of the staff itself, which differs for small staves.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorOptions {
    /// Abscissa margin projected around the staff lines.
    pub staff_abscissa_margin: f64,
    /// Abscissa margin for refining peak sides.
    pub bar_refine_dx: f64,
    /// Number of largest derivatives averaged into the elite derivative.
    pub top_derivative_number: usize,
    /// Minimum derivative, as ratio of the elite derivative.
    pub min_derivative_ratio: f64,
    /// Minimum projection value of a bar peak (specific).
    pub bar_threshold: f64,
    /// Minimum projection value of a brace peak (specific).
    pub brace_threshold: f64,
    /// Maximum vertical background gap within a bar (specific).
    pub gap_threshold: f64,
    /// Maximum chunk value on top of the staff lines.
    pub chunk_threshold: f64,
    /// Maximum projection value of a blank, as ratio of cumulated lines.
    pub blank_threshold: f64,
    /// Minimum width of a small blank region.
    pub min_small_blank_width: f64,
    /// Minimum width of a standard blank region.
    pub min_standard_blank_width: f64,
    /// Minimum width of a wide blank region, limiting the peak search.
    pub min_wide_blank_width: f64,
    pub max_bar_width: f64,
    /// Maximum gap between the lines left end and the first peak.
    pub max_left_extremum: f64,
    /// Maximum gap between the last peak and the lines right end.
    pub max_right_extremum: f64,
    /// Width of the region where a chunk is measured beside a peak.
    pub chunk_width: f64,
}

impl Default for ProjectorOptions {
    fn default() -> Self {
        Self {
            staff_abscissa_margin: 15.0,
            bar_refine_dx: 0.25,
            top_derivative_number: 5,
            min_derivative_ratio: 0.3,
            bar_threshold: 2.5,
            brace_threshold: 1.1,
            gap_threshold: 0.6,
            chunk_threshold: 1.2,
            blank_threshold: 0.5,
            min_small_blank_width: 0.1,
            min_standard_blank_width: 1.0,
            min_wide_blank_width: 2.0,
            max_bar_width: 1.5,
            max_left_extremum: 0.15,
            max_right_extremum: 0.3,
            chunk_width: 0.15,
        }
    }
}

/// Pixel values of [`ProjectorOptions`] for one staff.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProjectorParams {
    pub staff_abscissa_margin: i32,
    pub bar_refine_dx: i32,
    pub top_derivative_number: usize,
    pub min_derivative_ratio: f64,
    pub bar_threshold: i32,
    pub brace_threshold: i32,
    pub gap_threshold: i32,
    pub chunk_threshold: f64,
    pub blank_threshold: f64,
    pub min_small_blank_width: i32,
    pub min_standard_blank_width: i32,
    pub min_wide_blank_width: i32,
    pub max_bar_width: i32,
    pub max_left_extremum: i32,
    pub max_right_extremum: i32,
    pub chunk_width: i32,
    /// Barline height of a one-line staff, in pixels.
    pub barline_height: i32,
    /// First peak of a one-line staff may be half high.
    pub one_line_half_mode: bool,
}

impl ProjectorParams {
    /// `specific` is the staff interline; `barline_count` the barline height
    /// of one-line staves, in interlines.
    pub fn new(
        options: &ProjectorOptions,
        scale: &Scale,
        specific: i32,
        one_line: bool,
        barline_count: i32,
        half_start: bool,
    ) -> Self {
        let large = &scale.interline;
        let specific = InterlineScale::new(specific);
        let barline_height = barline_count * specific.main;
        let bar_threshold = if one_line {
            (barline_height as f64 * options.bar_threshold / 4.0).round() as i32
        } else {
            specific.to_pixels(options.bar_threshold)
        };
        Self {
            staff_abscissa_margin: large.to_pixels(options.staff_abscissa_margin),
            bar_refine_dx: large.to_pixels(options.bar_refine_dx),
            top_derivative_number: options.top_derivative_number.max(1),
            min_derivative_ratio: options.min_derivative_ratio,
            bar_threshold,
            brace_threshold: specific.to_pixels(options.brace_threshold),
            gap_threshold: specific.to_pixels(options.gap_threshold),
            chunk_threshold: specific.to_pixels_f(options.chunk_threshold),
            blank_threshold: options.blank_threshold,
            min_small_blank_width: large.to_pixels(options.min_small_blank_width),
            min_standard_blank_width: large.to_pixels(options.min_standard_blank_width),
            min_wide_blank_width: large.to_pixels(options.min_wide_blank_width),
            max_bar_width: large.to_pixels(options.max_bar_width),
            max_left_extremum: large.to_pixels(options.max_left_extremum),
            max_right_extremum: large.to_pixels(options.max_right_extremum),
            chunk_width: large.to_pixels(options.chunk_width).max(1),
            barline_height,
            one_line_half_mode: one_line && half_start,
        }
    }
}

/// Options of the cross-staff peak graph.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakGraphOptions {
    /// Maximum slope difference with the sheet vertical for an alignment.
    pub max_alignment_slope: f64,
    /// Maximum width difference of aligned peaks.
    pub max_alignment_delta_width: f64,
    /// Maximum deskewed abscissa shift of aligned brace portions.
    pub max_alignment_brace_dx: f64,
    /// Maximum vertical gap within a connection.
    pub max_connection_gap: f64,
    /// Maximum background ratio within a connection.
    pub max_connection_white_ratio: f64,
    /// Minimum curvature radius of a bar stick.
    pub min_bar_curvature: f64,
    /// Maximum width difference ratio when splitting a merged peak.
    pub max_width_ratio: f64,
    /// Vertical lookup beyond the staff when building bar sticks.
    pub bracket_lookup_extension: f64,
    /// Maximum gap between two members of a double bar.
    pub max_close_gap: f64,
    /// Maximum offset between staff start and a first connection.
    pub max_first_connection_x_offset: f64,
    /// Sampling step of bar sticks.
    pub bar_segment_length: f64,
}

impl Default for PeakGraphOptions {
    fn default() -> Self {
        Self {
            max_alignment_slope: 0.06,
            max_alignment_delta_width: 0.6,
            max_alignment_brace_dx: 0.75,
            max_connection_gap: 2.0,
            max_connection_white_ratio: 0.35,
            min_bar_curvature: 10.0,
            max_width_ratio: 0.3,
            bracket_lookup_extension: 2.0,
            max_close_gap: 0.4,
            max_first_connection_x_offset: 2.0,
            bar_segment_length: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct PeakGraphParams {
    pub max_alignment_slope: f64,
    pub max_alignment_delta_width: i32,
    pub max_alignment_brace_dx: i32,
    pub max_connection_gap: i32,
    pub max_connection_white_ratio: f64,
    pub min_bar_curvature: i32,
    pub max_width_ratio: f64,
    pub bracket_lookup_extension: i32,
    pub max_close_gap: i32,
    pub max_first_connection_x_offset: i32,
    pub bar_step: i32,
}

impl PeakGraphParams {
    pub fn new(options: &PeakGraphOptions, scale: &Scale) -> Self {
        Self {
            max_alignment_slope: options.max_alignment_slope,
            max_alignment_delta_width: scale.to_pixels(options.max_alignment_delta_width).max(1),
            max_alignment_brace_dx: scale.to_pixels(options.max_alignment_brace_dx),
            max_connection_gap: scale.to_pixels(options.max_connection_gap).max(1),
            max_connection_white_ratio: options.max_connection_white_ratio,
            min_bar_curvature: scale.to_pixels(options.min_bar_curvature),
            max_width_ratio: options.max_width_ratio,
            bracket_lookup_extension: scale.to_pixels(options.bracket_lookup_extension),
            max_close_gap: scale.to_pixels(options.max_close_gap),
            max_first_connection_x_offset: scale.to_pixels(options.max_first_connection_x_offset),
            bar_step: scale.to_pixels(options.bar_segment_length).max(1),
        }
    }
}

/// Options of the grid assembly: columns, purges, braces, brackets, parts.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BarsOptions {
    /// Systems with at least this many staves keep their extending peaks.
    pub large_system_staff_count: usize,
    /// Minimum width delta between thin and thick barlines, as a fraction
    /// of interline.
    pub min_thin_thick_delta: f64,
    /// Maximum extension of a bar beyond its system staves.
    pub max_bar_extension: f64,
    /// Maximum distance between lines left end and start bar.
    pub max_lines_left_to_start_bar: f64,
    /// Maximum gap between two bars of a double bar.
    pub max_double_bar_gap: f64,
    /// Minimum width of a measure.
    pub min_measure_width: f64,
    /// Maximum abscissa shift of a chain joining a column.
    pub max_column_dx: f64,
    /// Minimum width of the first peak of a C-clef.
    pub min_peak1_width_for_c_clef: f64,
    /// Maximum width of the second peak of a C-clef.
    pub max_peak2_width_for_c_clef: f64,
    /// Abscissa look-ahead after a C-clef second peak.
    pub c_clef_tail: f64,
    /// Margin on the left of brace portions.
    pub brace_left_margin: f64,
    /// Sampling step of brace filaments.
    pub brace_segment_length: f64,
    /// Minimum height of a brace portion.
    pub min_brace_portion_height: f64,
    /// Maximum width of sections used for braces.
    pub max_brace_thickness: f64,
    pub max_brace_peak_width: f64,
    /// Maximum gap between a brace and the first bar.
    pub max_brace_bar_gap: f64,
    /// Gap ignored between a brace and the first bar.
    pub brace_bar_neutral_gap: f64,
    /// Vertical lookup beyond the staff when building brace portions.
    pub brace_lookup_extension: f64,
    /// Maximum curvature radius of a brace portion.
    pub max_brace_curvature: f64,
    /// Minimum gutter between the two staves of a separate-staff part.
    pub min_separate_staff_gutter: f64,
    pub min_bracket_width: f64,
    /// Maximum extension of a bracket beyond its staff.
    pub max_bracket_extension: f64,
    /// Width of the serif lookup region.
    pub serif_roi_width: f64,
    /// Height of the serif lookup region.
    pub serif_roi_height: f64,
    /// Minimum serif weight, as fraction of the square interline.
    pub serif_min_weight: f64,
}

impl Default for BarsOptions {
    fn default() -> Self {
        Self {
            large_system_staff_count: 4,
            min_thin_thick_delta: 0.2,
            max_bar_extension: 1.0,
            max_lines_left_to_start_bar: 0.15,
            max_double_bar_gap: 0.75,
            min_measure_width: 2.0,
            max_column_dx: 0.75,
            min_peak1_width_for_c_clef: 0.3,
            max_peak2_width_for_c_clef: 0.3,
            c_clef_tail: 2.0,
            brace_left_margin: 0.5,
            brace_segment_length: 1.0,
            min_brace_portion_height: 3.0,
            max_brace_thickness: 1.0,
            max_brace_peak_width: 3.0,
            max_brace_bar_gap: 2.0,
            brace_bar_neutral_gap: 0.1,
            brace_lookup_extension: 0.5,
            max_brace_curvature: 25.0,
            min_separate_staff_gutter: 2.5,
            min_bracket_width: 0.25,
            max_bracket_extension: 1.25,
            serif_roi_width: 2.0,
            serif_roi_height: 2.0,
            serif_min_weight: 0.2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BarsParams {
    pub large_system_staff_count: usize,
    pub min_normed_delta_width: f64,
    pub max_bar_extension: i32,
    pub max_lines_left_to_start_bar: i32,
    pub max_double_bar_gap: i32,
    pub min_measure_width: i32,
    pub max_column_dx: i32,
    pub min_peak1_width_for_c_clef: i32,
    pub max_peak2_width_for_c_clef: i32,
    pub c_clef_tail: i32,
    pub brace_left_margin: i32,
    pub brace_step: i32,
    pub min_brace_portion_height: i32,
    pub max_brace_thickness: i32,
    pub max_brace_peak_width: i32,
    pub max_brace_bar_gap: i32,
    pub brace_bar_neutral_gap: i32,
    pub brace_lookup_extension: i32,
    pub max_brace_curvature: i32,
    pub min_separate_staff_gutter: i32,
    pub min_bracket_width: i32,
    pub max_bracket_extension: i32,
    pub serif_roi_width: i32,
    pub serif_roi_height: i32,
    pub serif_min_weight: i32,
}

impl BarsParams {
    pub fn new(options: &BarsOptions, scale: &Scale) -> Self {
        Self {
            large_system_staff_count: options.large_system_staff_count,
            min_normed_delta_width: options.min_thin_thick_delta,
            max_bar_extension: scale.to_pixels(options.max_bar_extension),
            max_lines_left_to_start_bar: scale.to_pixels(options.max_lines_left_to_start_bar),
            max_double_bar_gap: scale.to_pixels(options.max_double_bar_gap),
            min_measure_width: scale.to_pixels(options.min_measure_width),
            max_column_dx: scale.to_pixels(options.max_column_dx),
            min_peak1_width_for_c_clef: scale.to_pixels(options.min_peak1_width_for_c_clef),
            max_peak2_width_for_c_clef: scale.to_pixels(options.max_peak2_width_for_c_clef),
            c_clef_tail: scale.to_pixels(options.c_clef_tail),
            brace_left_margin: scale.to_pixels(options.brace_left_margin),
            brace_step: scale.to_pixels(options.brace_segment_length).max(1),
            min_brace_portion_height: scale.to_pixels(options.min_brace_portion_height),
            max_brace_thickness: scale.to_pixels(options.max_brace_thickness),
            max_brace_peak_width: scale.to_pixels(options.max_brace_peak_width),
            max_brace_bar_gap: scale.to_pixels(options.max_brace_bar_gap),
            brace_bar_neutral_gap: scale.to_pixels(options.brace_bar_neutral_gap),
            brace_lookup_extension: scale.to_pixels(options.brace_lookup_extension),
            max_brace_curvature: scale.to_pixels(options.max_brace_curvature),
            min_separate_staff_gutter: scale.to_pixels(options.min_separate_staff_gutter),
            min_bracket_width: scale.to_pixels(options.min_bracket_width),
            max_bracket_extension: scale.to_pixels(options.max_bracket_extension),
            serif_roi_width: scale.to_pixels(options.serif_roi_width),
            serif_roi_height: scale.to_pixels(options.serif_roi_height),
            serif_min_weight: scale.area_to_pixels(options.serif_min_weight),
        }
    }
}
