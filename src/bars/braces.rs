//! Brace portions at staff starts and brace interpretations.

use super::peak::{Peak, PeakFlags, PeakId};
use super::BarsRetriever;
use crate::filament::{BarFilamentBuilder, Filament};
use crate::grade::INTRINSIC_RATIO;
use crate::image::PixelSource;
use crate::sections::Section;
use crate::sig::{Inter, InterKind};
use crate::types::{Orientation, Rect, VerticalSide};
use log::{debug, warn};
use std::collections::HashSet;

/// Region covering a vertical chain of brace portions.
///
/// Each portion contributes a band spanning its ordinates, from a margin
/// left of its start to just past its stop; edges are linear between
/// consecutive bands.
#[derive(Clone, Debug)]
struct BraceOutline {
    /// (ordinate, abscissa) vertices of the left edge, top down.
    left: Vec<(i32, i32)>,
    /// (ordinate, abscissa) vertices of the right edge, top down.
    right: Vec<(i32, i32)>,
}

impl BraceOutline {
    fn new(portions: &[&Peak], left_margin: i32) -> Self {
        let mut left = Vec::with_capacity(2 * portions.len());
        let mut right = Vec::with_capacity(2 * portions.len());
        for p in portions {
            left.push((p.top, p.start - left_margin));
            left.push((p.bottom + 1, p.start - left_margin));
            right.push((p.top, p.stop + 1));
            right.push((p.bottom + 1, p.stop + 1));
        }
        Self { left, right }
    }

    fn y_range(&self) -> Option<(i32, i32)> {
        Some((self.left.first()?.0, self.left.last()?.0))
    }

    /// Abscissae of the edge segments crossing ordinate `y`.
    fn crossings(edge: &[(i32, i32)], y: f64) -> impl Iterator<Item = f64> + '_ {
        edge.windows(2).filter_map(move |w| {
            let ((y0, x0), (y1, x1)) = (w[0], w[1]);
            let (y0, y1) = (y0 as f64, y1 as f64);
            if y < y0 || y > y1 {
                None
            } else if y1 == y0 {
                Some(x0.max(x1) as f64)
            } else {
                Some(x0 as f64 + (x1 - x0) as f64 * (y - y0) / (y1 - y0))
            }
        })
    }

    /// Inner abscissa range at `y`.
    fn span_at(&self, y: f64) -> (f64, f64) {
        let lo = Self::crossings(&self.left, y).fold(f64::NEG_INFINITY, f64::max);
        let hi = Self::crossings(&self.right, y).fold(f64::INFINITY, f64::min);
        (lo, hi)
    }

    /// True when `rect` lies entirely inside the outline.
    fn contains(&self, rect: &Rect) -> bool {
        let Some((top, bottom)) = self.y_range() else {
            return false;
        };
        let (y0, y1) = (rect.y, rect.y + rect.height);
        if y0 < top || y1 > bottom {
            return false;
        }
        let (x0, x1) = (rect.x as f64, (rect.x + rect.width) as f64);
        let vertices = self.left.iter().chain(&self.right).map(|&(y, _)| y);
        [y0, y1]
            .into_iter()
            .chain(vertices.filter(|&y| y > y0 && y < y1))
            .all(|y| {
                let (lo, hi) = self.span_at(y as f64);
                lo <= x0 && x1 <= hi
            })
    }
}

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Vertical sections thin enough to belong to a brace.
    fn brace_sections(&self) -> Vec<&Section> {
        self.lags
            .vertical
            .iter()
            .filter(|s| s.bounds().width <= self.params.max_brace_thickness)
            .collect()
    }

    /// Look for a brace portion at the start of each staff of multi-staff
    /// systems.
    ///
    /// The portion is searched left of the first peak; failing that and
    /// when the first peak lies before the start peak, left of the second
    /// peak, the brace portion then replacing the first peak.
    pub(super) fn detect_brace_portions(&mut self) {
        let lags = self.lags;
        let builder = BarFilamentBuilder::new(&lags.vertical, self.params.max_brace_thickness, self.params.brace_step);
        let span = self.params.max_brace_peak_width + self.params.max_brace_bar_gap;

        for staves in self.multi_staff_systems() {
            for staff in staves {
                let Some(i_start) = self.projectors[staff].start_peak_index(&self.graph) else {
                    continue;
                };
                let peaks = self.projectors[staff].peaks().to_vec();
                let first = peaks[0];
                let max_right = self.graph.peak(first).start - 1 - self.params.brace_bar_neutral_gap;
                let min_left = (max_right - span).max(0);
                if let Some(brace) = self.look_for_brace_peak(staff, &builder, min_left, max_right) {
                    let id = self.graph.add_peak(brace);
                    self.projectors[staff].set_brace_peak(Some(id));
                    debug!("bars: staff#{} brace portion {}", staff + 1, self.graph.peak(id));
                    continue;
                }
                if i_start >= 1 {
                    let second = peaks[1];
                    let max_right = self.graph.peak(second).start - 1 - self.params.brace_bar_neutral_gap;
                    let min_left = (max_right - span).max(0);
                    if let Some(brace) = self.look_for_brace_peak(staff, &builder, min_left, max_right) {
                        let id = self.replace_peak(first, brace);
                        self.projectors[staff].set_brace_peak(Some(id));
                        debug!("bars: staff#{} brace portion {} replaces first peak", staff + 1, self.graph.peak(id));
                    }
                }
            }
        }
    }

    /// Brace portion within `min_left..=max_right` of `staff`, with its
    /// filament and its top/middle/bottom role.
    fn look_for_brace_peak(
        &mut self,
        staff: usize,
        builder: &BarFilamentBuilder<'_>,
        min_left: i32,
        max_right: i32,
    ) -> Option<Peak> {
        let mut brace =
            self.projectors[staff].find_brace_peak(&self.staves.staves()[staff], &self.skew, min_left, max_right)?;
        if brace.width() > self.params.max_brace_peak_width {
            debug!("bars: staff#{} too wide brace {}", staff + 1, brace);
            return None;
        }

        let core = brace.bounds();
        let lookup = core.grow(0, self.params.brace_lookup_extension);
        let id = self.next_filament_id();
        let filament = builder.build(id, &core, &lookup)?;
        if filament.length() < self.params.min_brace_portion_height {
            debug!("bars: staff#{} brace portion too short {}", staff + 1, filament.length());
            return None;
        }
        let curvature = filament.curvature_radius();
        debug!(
            "bars: staff#{} brace curvature {:.1} vs {}",
            staff + 1,
            curvature,
            self.params.max_brace_curvature
        );
        if curvature >= self.params.max_brace_curvature as f64 {
            return None;
        }
        brace.filament = Some(filament);

        let system = &self.systems[self.system_of[staff]];
        let half_line = self.half_line();
        let limit = self.params.brace_lookup_extension as f64;
        let beyond = |side: VerticalSide| brace.extension(side, half_line) > limit;
        let beyond_top = beyond(VerticalSide::Top) && system.first_staff() != Some(staff);
        let beyond_bottom = beyond(VerticalSide::Bottom) && system.last_staff() != Some(staff);
        match (beyond_top, beyond_bottom) {
            (true, true) => brace.set(PeakFlags::BRACE_MIDDLE),
            (false, true) => brace.set(PeakFlags::BRACE_TOP),
            (true, false) => brace.set(PeakFlags::BRACE_BOTTOM),
            (false, false) => {}
        }
        Some(brace)
    }

    /// Chain brace portions top down from each brace top and record one
    /// brace interpretation per chain.
    pub(super) fn build_braces(&mut self) {
        for system in 0..self.systems.len() {
            if !self.systems[system].is_multi_staff() {
                continue;
            }
            let staves = self.systems[system].staves.clone();
            let mut i = 0;
            while i < staves.len() {
                let staff = staves[i];
                let Some(brace) = self.projectors[staff].brace_peak() else {
                    i += 1;
                    continue;
                };
                if !self.graph.peak(brace).is(PeakFlags::BRACE_TOP) {
                    i += 1;
                    continue;
                }

                let mut portions = vec![brace];
                let mut top = brace;
                for &other in &staves[i + 1..] {
                    let mut portion = self.projectors[other].brace_peak();
                    if portion.is_none() {
                        let first = self.projectors[other].peaks().first().copied();
                        if let Some(p) = first.filter(|&p| self.check_brace_alignment(top, p)) {
                            self.graph.peak_mut(p).set(PeakFlags::BRACE_MIDDLE);
                            self.projectors[other].set_brace_peak(Some(p));
                            portion = Some(p);
                        }
                    }
                    let Some(portion) = portion else {
                        warn!("bars: staff#{} isolated brace top", staff + 1);
                        break;
                    };
                    let peak = self.graph.peak(portion);
                    if !peak.is(PeakFlags::BRACE_MIDDLE) && !peak.is(PeakFlags::BRACE_BOTTOM) {
                        warn!("bars: staff#{} expected brace middle or bottom", other + 1);
                        break;
                    }
                    let is_bottom = peak.is(PeakFlags::BRACE_BOTTOM);
                    portions.push(portion);
                    if is_bottom {
                        break;
                    }
                    top = portion;
                }

                if portions.len() > 1 {
                    let filament = self.build_brace_filament(&portions);
                    let inter = Inter::new(InterKind::Brace, filament.bounds(), INTRINSIC_RATIO);
                    let id = self.systems[system].sig.add_vertex(inter);
                    debug!(
                        "bars: system#{} brace {:?} over {} staves",
                        system + 1,
                        id,
                        portions.len()
                    );
                }
                let last_staff = portions.last().map_or(staff, |&p| self.graph.peak(p).staff);
                i = staves.iter().position(|&s| s == last_staff).unwrap_or(i) + 1;
            }
        }
    }

    /// Filament of a whole brace: the portion filaments plus every thin
    /// section lying in the outline of the portions and touching them.
    fn build_brace_filament(&mut self, portions: &[PeakId]) -> Filament {
        let peaks: Vec<&Peak> = portions.iter().map(|&p| self.graph.peak(p)).collect();
        let outline = BraceOutline::new(&peaks, self.params.brace_left_margin);

        let mut members: Vec<Section> = peaks
            .iter()
            .filter_map(|p| p.filament.as_ref())
            .flat_map(|f| f.sections().iter().cloned())
            .collect();
        let taken: HashSet<_> = members.iter().map(|s| s.id).collect();
        let mut candidates: Vec<&Section> = self
            .brace_sections()
            .into_iter()
            .filter(|s| !taken.contains(&s.id) && outline.contains(&s.bounds()))
            .collect();

        while let Some(index) = candidates
            .iter()
            .position(|c| members.iter().any(|m| m.touches(c)))
        {
            members.push(candidates.swap_remove(index).clone());
        }

        let id = self.next_filament_id();
        Filament::new(id, Orientation::Vertical, self.params.brace_step, members)
    }

    /// Remove the peaks lying entirely left of the brace portion.
    pub(super) fn purge_left_of_braces(&mut self) {
        for staves in self.multi_staff_systems() {
            for staff in staves {
                let Some(brace) = self.projectors[staff].brace_peak() else {
                    continue;
                };
                let Some(i_start) = self.projectors[staff].start_peak_index(&self.graph) else {
                    continue;
                };
                let brace_start = self.graph.peak(brace).start;
                let doomed: Vec<PeakId> = self.projectors[staff].peaks()[..i_start]
                    .iter()
                    .rev()
                    .copied()
                    .filter(|&p| self.graph.peak(p).stop < brace_start)
                    .collect();
                if !doomed.is_empty() {
                    debug!("bars: staff#{} removing {} peaks left of brace", staff + 1, doomed.len());
                    self.remove_peaks(staff, &doomed);
                    self.delete_related_columns(&doomed);
                }
            }
        }
    }

    /// Make sure the lines of single-staff systems do not start far before
    /// the first peak.
    pub(super) fn verify_lines_root(&mut self) {
        for system in &self.systems {
            if system.is_multi_staff() {
                continue;
            }
            let Some(staff) = system.first_staff() else {
                continue;
            };
            self.projectors[staff].check_lines_root(&mut self.staves.staves_mut()[staff], &mut self.graph);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skew::Skew;

    fn portion(top: i32, bottom: i32, start: i32, stop: i32) -> Peak {
        Peak::new(0, top, bottom, start, stop, None, &Skew::default())
    }

    #[test]
    fn outline_follows_portions() {
        let upper = portion(100, 180, 40, 49);
        let lower = portion(300, 380, 60, 69);
        let outline = BraceOutline::new(&[&upper, &lower], 5);

        assert!(outline.contains(&Rect::new(36, 110, 4, 60)));
        // Left of the upper band margin.
        assert!(!outline.contains(&Rect::new(30, 110, 4, 60)));
        // In the gutter the edges are interpolated: at y=240 the band runs
        // from 45 to 60.
        assert!(outline.contains(&Rect::new(46, 238, 12, 4)));
        assert!(!outline.contains(&Rect::new(38, 238, 4, 4)));
        // Above and below the chain.
        assert!(!outline.contains(&Rect::new(42, 90, 2, 20)));
        assert!(!outline.contains(&Rect::new(62, 370, 2, 20)));
        assert!(outline.contains(&Rect::new(56, 300, 14, 81)));
    }

    #[test]
    fn empty_outline_contains_nothing() {
        let outline = BraceOutline::new(&[], 3);
        assert!(!outline.contains(&Rect::new(0, 0, 1, 1)));
    }
}
