//! Per-staff projection analysis.
//!
//! Overview
//! - The projection counts foreground pixels per abscissa between the first
//!   and last staff lines; its first difference is the derivative.
//! - Thresholds self-calibrate: the minimum derivative is a ratio of the
//!   mean of the largest derivative magnitudes, blank and chunk thresholds
//!   derive from the cumulated line thickness.
//! - Blanks (runs without staff lines) bound the peak search window and
//!   later refine the true staff ends.
//! - Runs above the bar threshold are split on derivative extrema, each
//!   resulting candidate being refined, checked for vertical gaps and graded.

use super::graph::PeakGraph;
use super::options::ProjectorParams;
use super::peak::{Peak, PeakFlags, PeakId, PEAK_IMPACT_NAMES, PEAK_IMPACT_WEIGHTS};
use crate::grade::{GradeImpacts, MIN_INTER_GRADE};
use crate::image::{vertical_core, BandLine, PixelSource};
use crate::skew::Skew;
use crate::staff::Staff;
use crate::types::HorizontalSide;
use log::{debug, warn};

/// Abscissa range where the projection shows no staff line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Blank {
    pub start: i32,
    pub stop: i32,
}

impl Blank {
    pub fn width(&self) -> i32 {
        self.stop - self.start + 1
    }

    fn mid(&self) -> i32 {
        (self.start + self.stop) / 2
    }
}

/// One refined side of a peak.
#[derive(Clone, Copy, Debug)]
struct PeakSide {
    abscissa: i32,
    der_impact: f64,
    chunk_impact: f64,
}

/// Thresholds tied to the staff lines.
#[derive(Clone, Copy, Debug, Default)]
struct LineThresholds {
    blank: i32,
    lines: i32,
    chunk: i32,
}

/// Peak search thresholds, halved for a half-height first barline.
#[derive(Clone, Copy, Debug)]
struct SearchMode {
    half: bool,
    min_count: i32,
    min_der_up: i32,
    min_der_down: i32,
}

pub struct StaffProjector {
    /// Index of the staff in the sheet staff list.
    pub staff: usize,
    params: ProjectorParams,
    sheet_width: i32,
    sheet_height: i32,
    values: Vec<i32>,
    derivative_threshold: i32,
    thresholds: LineThresholds,
    blanks: Vec<Blank>,
    left_blank: Option<Blank>,
    right_blank: Option<Blank>,
    peaks: Vec<PeakId>,
    brace_peak: Option<PeakId>,
}

impl StaffProjector {
    pub(crate) fn new(staff: usize, params: ProjectorParams, sheet_width: i32, sheet_height: i32) -> Self {
        Self {
            staff,
            params,
            sheet_width,
            sheet_height,
            values: vec![0; sheet_width.max(0) as usize],
            derivative_threshold: 0,
            thresholds: LineThresholds::default(),
            blanks: Vec::new(),
            left_blank: None,
            right_blank: None,
            peaks: Vec::new(),
            brace_peak: None,
        }
    }

    /// Compute projection, thresholds and blanks, then register the peaks
    /// found in the graph.
    pub fn process<P: PixelSource + ?Sized>(&mut self, staff: &Staff, source: &P, skew: &Skew, graph: &mut PeakGraph) {
        debug!("projector: analysing staff#{}", staff.id.0);
        self.compute_projection(staff, source);
        self.compute_line_thresholds(staff);
        self.find_all_blanks();
        self.select_ending_blanks(staff);
        for peak in self.find_peaks(staff, source, skew) {
            let id = graph.add_peak(peak);
            self.peaks.push(id);
        }
    }

    pub fn peaks(&self) -> &[PeakId] {
        &self.peaks
    }

    pub fn last_peak(&self) -> Option<PeakId> {
        self.peaks.last().copied()
    }

    pub fn brace_peak(&self) -> Option<PeakId> {
        self.brace_peak
    }

    pub fn set_brace_peak(&mut self, peak: Option<PeakId>) {
        self.brace_peak = peak;
    }

    pub fn blanks(&self) -> &[Blank] {
        &self.blanks
    }

    pub fn derivative_threshold(&self) -> i32 {
        self.derivative_threshold
    }

    /// Projection value at `x`, zero outside the sheet.
    pub fn value(&self, x: i32) -> i32 {
        if x < 0 || x >= self.sheet_width {
            return 0;
        }
        self.values[x as usize]
    }

    pub fn derivative(&self, x: i32) -> i32 {
        self.value(x) - self.value(x - 1)
    }

    /// Index of the peak starting the staff, if any.
    pub fn start_peak_index(&self, graph: &PeakGraph) -> Option<usize> {
        self.peaks
            .iter()
            .position(|&p| graph.peak(p).is_staff_end(HorizontalSide::Left))
    }

    pub fn index_of(&self, peak: PeakId) -> Option<usize> {
        self.peaks.iter().position(|&p| p == peak)
    }

    /// Register `peak` and insert it just before `before`.
    pub fn insert_peak(&mut self, graph: &mut PeakGraph, peak: Peak, before: PeakId) -> PeakId {
        let id = graph.add_peak(peak);
        let index = self.index_of(before).unwrap_or(self.peaks.len());
        self.peaks.insert(index, id);
        id
    }

    /// Remove `peak` from the staff and from the graph.
    pub fn remove_peak(&mut self, graph: &mut PeakGraph, peak: PeakId) {
        self.peaks.retain(|&p| p != peak);
        if self.brace_peak == Some(peak) {
            self.brace_peak = None;
        }
        graph.remove_peak(peak);
    }

    pub fn remove_peaks(&mut self, graph: &mut PeakGraph, peaks: &[PeakId]) {
        for &peak in peaks {
            self.remove_peak(graph, peak);
        }
    }

    fn x_clamp(&self, x: i32) -> i32 {
        x.clamp(0, (self.sheet_width - 1).max(0))
    }

    fn y_clamp(&self, y: i32) -> i32 {
        y.clamp(0, (self.sheet_height - 1).max(0))
    }

    /// Ordinates bounding the projected band at `x`.
    ///
    /// A one-line staff uses a band of the barline height centred on its
    /// line.
    fn band_at(&self, staff: &Staff, x: f64) -> (i32, i32) {
        if staff.is_one_line() {
            let mid = staff.first_line().y_at(x);
            let half = (self.params.barline_height / 2) as f64;
            ((mid - half).round() as i32, (mid + half).round() as i32)
        } else {
            (
                staff.first_line().y_at(x).round() as i32,
                staff.last_line().y_at(x).round() as i32,
            )
        }
    }

    fn compute_projection<P: PixelSource + ?Sized>(&mut self, staff: &Staff, source: &P) {
        let dx = self.params.staff_abscissa_margin;
        let x_min = self.x_clamp(staff.left().round() as i32 - dx);
        let x_max = self.x_clamp(staff.right().round() as i32 + dx);
        let mut derivatives = Vec::new();
        for x in x_min..=x_max.min(self.sheet_width - 1) {
            let (top, bottom) = self.band_at(staff, x as f64);
            let (y0, y1) = (self.y_clamp(top), self.y_clamp(bottom - 1));
            self.values[x as usize] = if y1 >= y0 { source.count_column(x, y0, y1) } else { 0 };
            if x > x_min {
                derivatives.push(self.derivative(x).abs());
            }
        }

        derivatives.sort_unstable();
        let top = self.params.top_derivative_number.min(derivatives.len());
        if top > 0 {
            let cumul: i32 = derivatives.iter().rev().take(top).sum();
            let elite = cumul as f64 / top as f64;
            self.derivative_threshold = (elite * self.params.min_derivative_ratio).round() as i32;
            debug!(
                "projector: staff#{} elite derivative {:.1} threshold {}",
                staff.id.0, elite, self.derivative_threshold
            );
        }
    }

    fn compute_line_thresholds(&mut self, staff: &Staff) {
        let n = staff.line_count();
        let mut cumul: f64 = staff.lines().iter().map(|l| l.thickness()).sum();
        if n > 1 {
            cumul *= (n - 1) as f64 / n as f64;
        }
        let fore = staff.mean_line_thickness().round() as i32;
        self.thresholds = LineThresholds {
            blank: (self.params.blank_threshold * cumul).floor() as i32,
            lines: cumul.round() as i32,
            chunk: (n as i32 - 1) * fore + self.params.chunk_threshold.round() as i32,
        };
        debug!(
            "projector: staff#{} thresholds blank:{} lines:{} chunk:{}",
            staff.id.0, self.thresholds.blank, self.thresholds.lines, self.thresholds.chunk
        );
    }

    fn find_all_blanks(&mut self) {
        let max_value = self.thresholds.blank;
        let mut start: Option<i32> = None;
        let mut stop = -1;
        for x in 0..self.sheet_width {
            if self.value(x) <= max_value {
                start.get_or_insert(x);
                stop = x;
            } else if let Some(s) = start.take() {
                self.blanks.push(Blank { start: s, stop });
            }
        }
        if let Some(s) = start {
            self.blanks.push(Blank { start: s, stop });
        }
    }

    /// First blank, going from `start` towards `side`, whose middle lies
    /// beyond `start` and whose width reaches `min_width`.
    pub fn select_blank(&self, side: HorizontalSide, start: i32, min_width: i32) -> Option<Blank> {
        let dir = side.direction();
        let accept = |b: &&Blank| dir * (b.mid() - start) > 0 && b.width() >= min_width;
        match side {
            HorizontalSide::Left => self.blanks.iter().rev().find(accept).copied(),
            HorizontalSide::Right => self.blanks.iter().find(accept).copied(),
        }
    }

    fn select_ending_blanks(&mut self, staff: &Staff) {
        let wide = self.params.min_wide_blank_width;
        self.left_blank = self.select_blank(HorizontalSide::Left, staff.left().round() as i32, wide);
        self.right_blank = self.select_blank(HorizontalSide::Right, staff.right().round() as i32, wide);
        debug!(
            "projector: staff#{} ending blanks {:?} {:?}",
            staff.id.0, self.left_blank, self.right_blank
        );
    }

    /// True if a standard blank starts within `start..=stop`.
    pub fn has_standard_blank(&self, start: i32, stop: i32) -> bool {
        if stop <= start {
            return false;
        }
        self.select_blank(HorizontalSide::Right, start, self.params.min_standard_blank_width)
            .is_some_and(|b| b.start <= stop)
    }

    fn find_peaks<P: PixelSource + ?Sized>(&self, staff: &Staff, source: &P, skew: &Skew) -> Vec<Peak> {
        let x_min = self.left_blank.map_or(0, |b| b.stop);
        let x_max = self.right_blank.map_or(self.sheet_width - 1, |b| b.start);
        let full = SearchMode {
            half: false,
            min_count: self.params.bar_threshold,
            min_der_up: self.derivative_threshold,
            min_der_down: self.derivative_threshold,
        };

        if self.params.one_line_half_mode && staff.is_one_line() {
            let half = SearchMode {
                half: true,
                min_count: self.params.bar_threshold / 2,
                min_der_up: self.derivative_threshold / 2,
                min_der_down: self.derivative_threshold / 2,
            };
            let first = self.find_peaks_in_range(staff, source, skew, x_min, x_max, half).into_iter().next();
            if let Some(first) = first {
                let rest_start = first.stop + 1;
                let mut peaks = vec![first];
                peaks.extend(self.find_peaks_in_range(staff, source, skew, rest_start, x_max, full));
                return peaks;
            }
        }
        self.find_peaks_in_range(staff, source, skew, x_min, x_max, full)
    }

    fn find_peaks_in_range<P: PixelSource + ?Sized>(
        &self,
        staff: &Staff,
        source: &P,
        skew: &Skew,
        x_min: i32,
        x_max: i32,
        mode: SearchMode,
    ) -> Vec<Peak> {
        let mut found: Vec<Peak> = Vec::new();
        let mut run: Option<(i32, i32)> = None;
        let mut x = x_min;
        while x <= x_max {
            if self.value(x) >= mode.min_count {
                run = Some(run.map_or((x, x), |(s, _)| (s, x)));
            } else if let Some((start, stop)) = run.take() {
                for peak in self.browse_range(staff, source, skew, start, stop, mode) {
                    x = x.max(peak.stop);
                    found.push(peak);
                }
            }
            x += 1;
        }
        if let Some((start, stop)) = run {
            if let Some(peak) = self.create_peak(staff, source, skew, start, stop, mode) {
                found.push(peak);
            }
        }
        debug!("projector: staff#{} {} peaks in {}..{}", staff.id.0, found.len(), x_min, x_max);
        found
    }

    /// Split a run above threshold on its derivative extrema.
    fn browse_range<P: PixelSource + ?Sized>(
        &self,
        staff: &Staff,
        source: &P,
        skew: &Skew,
        range_start: i32,
        range_stop: i32,
        mode: SearchMode,
    ) -> Vec<Peak> {
        let mut list = Vec::new();
        let mut start: Option<i32> = Some(range_start);
        let mut x = range_start;
        while x <= range_stop {
            let der = self.derivative(x);
            if der >= mode.min_der_up {
                let mut max_der = der;
                let mut xx = x + 1;
                while xx <= range_stop {
                    let d = self.derivative(xx);
                    if d > max_der {
                        max_der = d;
                        x = xx;
                        xx += 1;
                    } else {
                        break;
                    }
                }
                start = Some(x);
            } else if der <= -mode.min_der_down {
                let mut min_der = der;
                let limit = self.x_clamp(range_stop + 1);
                let mut xx = x + 1;
                while xx <= limit {
                    let d = self.derivative(xx);
                    if d <= min_der {
                        min_der = d;
                        x = xx;
                        xx += 1;
                    } else {
                        break;
                    }
                }
                if x == range_stop {
                    x = range_stop + 1;
                }
                let stop = x;
                if let Some(s) = start {
                    if s < stop {
                        if let Some(peak) = self.create_peak(staff, source, skew, s, stop - 1, mode) {
                            list.push(peak);
                        }
                        start = None;
                    }
                }
            }
            x += 1;
        }
        if let Some(s) = start {
            if let Some(peak) = self.create_peak(staff, source, skew, s, range_stop, mode) {
                list.push(peak);
            }
        }
        list
    }

    fn create_peak<P: PixelSource + ?Sized>(
        &self,
        staff: &Staff,
        source: &P,
        skew: &Skew,
        raw_start: i32,
        raw_stop: i32,
        mode: SearchMode,
    ) -> Option<Peak> {
        let min_value = if mode.half {
            self.params.bar_threshold / 2
        } else {
            self.params.bar_threshold
        };
        let spans = if staff.is_one_line() { 4 } else { staff.line_count() as i32 - 1 };
        let total_height = staff.interline() * spans;
        let value_range = (if mode.half { total_height / 2 } else { total_height } - min_value) as f64;

        let left = self.refine_peak_side(raw_start, raw_stop, HorizontalSide::Left, min_value, mode.min_der_up)?;
        let right = self.refine_peak_side(raw_start, raw_stop, HorizontalSide::Right, min_value, mode.min_der_down)?;
        let (start, stop) = (left.abscissa, right.abscissa);
        if stop - start + 1 > self.params.max_bar_width {
            return None;
        }

        let value = (start..=stop).map(|x| self.value(x)).max().unwrap_or(0);
        let x_mid = (start + stop) / 2;
        let (top, bottom) = self.band_at(staff, x_mid as f64);
        // The core runs from first to last line, which for a one-line staff
        // leaves room for a half-high opening barline.
        let core_top = staff.first_line().y_at(x_mid as f64).round();
        let core_bottom = staff.last_line().y_at(x_mid as f64).round();
        let width = stop - start + 1;
        let dx = if width <= 2 { 1 } else { 0 };
        let core = vertical_core(
            source,
            &BandLine::vertical((start - dx) as f64, core_top, core_bottom),
            &BandLine::vertical((stop + dx) as f64, core_top, core_bottom),
        );
        if core.gap > self.params.gap_threshold {
            return None;
        }

        let gap_threshold = self.params.gap_threshold.max(1) as f64;
        let core_impact = if value_range > 0.0 {
            (value - min_value) as f64 / value_range
        } else {
            1.0
        };
        let gap_impact = 1.0 - core.gap as f64 / gap_threshold;
        let impacts = GradeImpacts::new(
            PEAK_IMPACT_NAMES,
            PEAK_IMPACT_WEIGHTS,
            vec![
                core_impact,
                gap_impact,
                left.der_impact,
                right.der_impact,
                left.chunk_impact,
                right.chunk_impact,
            ],
        );
        if impacts.grade() < MIN_INTER_GRADE {
            return None;
        }
        Some(Peak::new(self.staff, top, bottom, start, stop, Some(impacts), skew))
    }

    /// Walk from the raw middle towards `side` to the strongest derivative.
    fn refine_peak_side(
        &self,
        x_start: i32,
        x_stop: i32,
        side: HorizontalSide,
        min_bar: i32,
        min_derivative: i32,
    ) -> Option<PeakSide> {
        let dir = side.direction();
        let min_chunk = self.thresholds.lines;
        let max_chunk = self.thresholds.chunk;
        let dx = self.params.bar_refine_dx;
        let mid = (x_start + x_stop) as f64 / 2.0;
        let (x1, x2) = match side {
            HorizontalSide::Right => (mid.ceil() as i32, self.x_clamp(x_stop + dx)),
            HorizontalSide::Left => (mid.floor() as i32, self.x_clamp(x_start - dx)),
        };
        let der_range = (min_bar - min_derivative).max(1) as f64;

        let mut best_der = 0;
        let mut best_x = None;
        let mut x = x1;
        while dir * (x2 - x) >= 0 {
            let der = self.derivative(x);
            if dir * (best_der - der) > 0 {
                best_der = der;
                best_x = Some(x);
            }
            x += dir;
        }
        let best_der = best_der.abs();

        match best_x {
            Some(bx) if best_der >= min_derivative => {
                let x = if dir > 0 { bx - 1 } else { bx };
                let chunk = self.chunk(x, dir);
                let chunk_impact = if chunk < min_chunk {
                    1.0
                } else if chunk > max_chunk {
                    0.0
                } else if max_chunk > min_chunk {
                    (max_chunk - chunk) as f64 / (max_chunk - min_chunk) as f64
                } else {
                    1.0
                };
                Some(PeakSide {
                    abscissa: x,
                    der_impact: best_der as f64 / der_range,
                    chunk_impact,
                })
            }
            _ => {
                let border = if dir > 0 { self.sheet_width - 1 } else { 0 };
                let value = self.value(border);
                (x2 == border && value >= min_derivative).then(|| PeakSide {
                    abscissa: border,
                    der_impact: value as f64 / der_range,
                    chunk_impact: 1.0,
                })
            }
        }
    }

    /// Minimum projection over the chunk width beyond `x0`, zero when out of
    /// the sheet.
    fn chunk(&self, x0: i32, dir: i32) -> i32 {
        let x1 = x0 + dir;
        let x2 = x1 + dir * (self.params.chunk_width - 1);
        if x2 < 0 || x2 > self.sheet_width - 1 {
            return 0;
        }
        let (lo, hi) = (x1.min(x2), x1.max(x2));
        (lo..=hi).map(|x| self.value(x)).min().unwrap_or(0)
    }

    /// Look for a brace portion right to left within `min_left..=max_right`.
    ///
    /// The scan skips the first values above the brace threshold, then
    /// collects the first run above threshold met after a valley.
    pub fn find_brace_peak(&self, staff: &Staff, skew: &Skew, min_left: i32, mut max_right: i32) -> Option<Peak> {
        let min_value = self.params.brace_threshold;
        let x_min = match self.left_blank {
            // +2 copes with a gap between blank and peak
            Some(blank) if blank.stop + 2 >= max_right => {
                max_right = blank.start - 1;
                self.select_blank(HorizontalSide::Left, max_right, self.params.min_wide_blank_width)
                    .map_or(min_left, |prev| prev.stop)
            }
            Some(blank) => min_left.max(blank.stop),
            None => min_left.max(0),
        };

        let mut brace_stop = None;
        let mut brace_start = None;
        let mut valley_hit = false;
        let mut x = max_right;
        while x >= x_min {
            if self.value(x) >= min_value {
                if valley_hit {
                    brace_stop.get_or_insert(x);
                    brace_start = Some(x);
                }
            } else if !valley_hit {
                valley_hit = true;
            } else if brace_stop.is_some() {
                break;
            }
            x -= 1;
        }
        match (brace_start, brace_stop) {
            (Some(start), Some(stop)) => self.create_brace_peak(staff, skew, start, stop, max_right),
            _ => None,
        }
    }

    fn create_brace_peak(&self, staff: &Staff, skew: &Skew, raw_start: i32, raw_stop: i32, max_right: i32) -> Option<Peak> {
        let left_blank = self.blanks.iter().take_while(|b| b.stop < raw_start).last();
        let mut start = left_blank.map_or(raw_start, |b| b.stop);
        let mut val = self.value(start);
        let mut x = start - 1;
        while x >= 0 {
            let next = self.value(x);
            if next < val {
                val = next;
                start = x;
            } else {
                break;
            }
            x -= 1;
        }

        let mut best = i32::MAX;
        let mut stop = None;
        for x in raw_stop..=max_right {
            let v = self.value(x);
            if v < best {
                best = v;
                stop = Some(x);
            }
        }
        let stop = stop?;
        let x_mid = ((start + stop) / 2) as f64;
        let top = staff.first_line().y_at(x_mid).round() as i32;
        let bottom = staff.last_line().y_at(x_mid).round() as i32;
        let mut brace = Peak::new(self.staff, top, bottom, start, stop, None, skew);
        brace.set(PeakFlags::BRACE);
        Some(brace)
    }

    /// For a single-staff system without brace, make sure the lines do not
    /// start far before the first peak; otherwise the start peak no longer
    /// ends the staff and the staff left side moves to the lines root.
    pub fn check_lines_root(&self, staff: &mut Staff, graph: &mut PeakGraph) {
        if self.brace_peak.is_some() || self.peaks.is_empty() {
            return;
        }
        let Some(i_start) = self.start_peak_index(graph) else {
            return;
        };
        let first_start = graph.peak(self.peaks[0]).start;
        match self.select_blank(HorizontalSide::Left, first_start, self.params.min_small_blank_width) {
            Some(blank) => {
                let gap = first_start - 1 - blank.stop;
                if gap > self.params.max_left_extremum {
                    graph.peak_mut(self.peaks[i_start]).unset(PeakFlags::STAFF_LEFT_END);
                    staff.set_abscissa(HorizontalSide::Left, (blank.stop + 1) as f64);
                    debug!("projector: staff#{} lines root at {}", staff.id.0, blank.stop + 1);
                }
            }
            None => warn!("projector: staff#{} no clear end on left", staff.id.0),
        }
    }

    /// Define the precise right end of the staff, from its last peak or from
    /// the first blank after the lines.
    pub fn refine_right_end(&self, staff: &mut Staff, graph: &mut PeakGraph) {
        let lines_end = staff.right().round() as i32;
        let end_peak = self.last_peak().filter(|&p| graph.peak(p).mid() >= lines_end);
        let staff_end = end_peak.map_or(lines_end, |p| graph.peak(p).stop);
        let x_max = self
            .select_blank(HorizontalSide::Right, staff_end, self.params.min_small_blank_width)
            .map_or(self.sheet_width - 1, |b| b.start - 1);

        match end_peak {
            Some(p) if x_max - graph.peak(p).stop <= self.params.max_right_extremum => {
                let mid = graph.peak(p).mid();
                debug!("projector: staff#{} right end at peak {} (lines {})", staff.id.0, mid, lines_end);
                staff.set_abscissa(HorizontalSide::Right, mid as f64);
                graph.peak_mut(p).set_staff_end(HorizontalSide::Right);
            }
            _ => {
                debug!("projector: staff#{} right end at blank {} (lines {})", staff.id.0, x_max, lines_end);
                staff.set_abscissa(HorizontalSide::Right, x_max as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests;
