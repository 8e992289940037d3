//! Purge passes on retained peaks, and thin/thick partition.

use super::peak::{PeakFlags, PeakId};
use super::BarsRetriever;
use crate::image::PixelSource;
use crate::types::{HorizontalSide, VerticalSide};
use log::debug;

/// What the C-clef rule needs to know about a peak.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeakSummary {
    pub start: i32,
    pub stop: i32,
    /// Neither a staff end, a brace nor a bracket.
    pub plain: bool,
    /// Connected above or below.
    pub connected: bool,
}

impl PeakSummary {
    fn width(&self) -> i32 {
        self.stop - self.start + 1
    }

    fn mid(&self) -> i32 {
        (self.start + self.stop) / 2
    }
}

/// Pixel thresholds of the C-clef rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CClefThresholds {
    pub min_peak1_width: i32,
    pub max_peak2_width: i32,
    pub max_double_bar_gap: i32,
    pub min_measure_width: i32,
    /// Distance after the second peak middle where tail peaks may lie.
    pub tail: i32,
}

/// Peaks recognised as the two vertical strokes of a C-clef, plus the
/// tail peaks found right after them. Values are indices in the input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CClefMatch {
    pub one: usize,
    pub two: usize,
    pub tails: Vec<usize>,
}

impl CClefMatch {
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        [self.one, self.two].into_iter().chain(self.tails.iter().copied())
    }
}

/// Detect C-clef look-alikes among the peaks of one staff.
///
/// A wide enough peak, unconnected, starting shortly after the current
/// measure start (right at the staff start, or beyond a double-bar gap
/// otherwise) and followed within a double-bar gap by a thin unconnected
/// peak forms a C-clef pair. Peaks whose middle lies within the tail
/// distance after the second one belong to the clef too, unless one of them
/// is connected, which cancels the whole match.
///
/// Matched peaks are removed from the scanned list as soon as they are
/// found, and the scan then skips as many following peaks as the match
/// held.
pub fn find_c_clefs(peaks: &[PeakSummary], staff_start: i32, t: &CClefThresholds) -> Vec<CClefMatch> {
    let mut matches = Vec::new();
    let mut live: Vec<usize> = (0..peaks.len()).collect();
    let mut measure_start = staff_start;
    let mut i = 0;
    while i < live.len() {
        let p1 = &peaks[live[i]];
        if p1.start <= measure_start {
            i += 1;
            continue;
        }
        if !p1.plain || p1.width() < t.min_peak1_width {
            measure_start = p1.stop + 1;
            i += 1;
            continue;
        }
        let gap = p1.start - measure_start;
        let min_gap = if measure_start == staff_start {
            0
        } else {
            t.max_double_bar_gap
        };
        if gap <= min_gap || gap >= t.min_measure_width || p1.connected {
            measure_start = p1.stop + 1;
            i += 1;
            continue;
        }

        if let Some(&second) = live.get(i + 1) {
            let p2 = &peaks[second];
            let gap2 = p2.start - p1.stop - 1;
            if p2.width() <= t.max_peak2_width && gap2 <= t.max_double_bar_gap && !p2.connected {
                let x_break = p2.mid() + t.tail;
                let mut tails = Vec::new();
                let mut cancelled = false;
                for &index in &live[i + 2..] {
                    let tp = &peaks[index];
                    if tp.mid() >= x_break {
                        break;
                    }
                    if tp.connected {
                        cancelled = true;
                        break;
                    }
                    tails.push(index);
                }
                if !cancelled {
                    let found = CClefMatch {
                        one: live[i],
                        two: second,
                        tails,
                    };
                    let skip = 1 + found.tails.len();
                    live.drain(i..i + 2 + found.tails.len());
                    matches.push(found);
                    i += skip;
                }
            }
        }
        i += 1;
    }
    matches
}

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Remove peaks left of the start peak separated from their right
    /// neighbour by more than a brace-to-bar gap.
    pub(super) fn purge_too_left(&mut self) {
        for staff in 0..self.projectors.len() {
            let Some(i_start) = self.projectors[staff].start_peak_index(&self.graph) else {
                continue;
            };
            let peaks = self.projectors[staff].peaks().to_vec();
            let mut prev = peaks[i_start];
            let mut doomed = Vec::new();
            for &peak in peaks[..i_start].iter().rev() {
                let gap = self.graph.peak(prev).start - self.graph.peak(peak).stop + 1;
                if gap > self.params.max_brace_bar_gap {
                    doomed.push(peak);
                } else {
                    prev = peak;
                }
            }
            if !doomed.is_empty() {
                debug!("bars: staff#{} removing {} too-left peaks", staff + 1, doomed.len());
                self.remove_peaks(staff, &doomed);
                self.delete_related_columns(&doomed);
            }
        }
    }

    /// Remove the plain peaks lying left of the staff start.
    pub(super) fn purge_left_peaks(&mut self) {
        for staff in 0..self.projectors.len() {
            let x_left = self.staves.staves()[staff].left().round() as i32;
            let mut doomed = Vec::new();
            for &id in self.projectors[staff].peaks() {
                let peak = self.graph.peak(id);
                if peak.start > x_left {
                    break;
                }
                if !peak.is_staff_end(HorizontalSide::Left) && !peak.is_brace() && !peak.is_bracket() {
                    doomed.push(id);
                }
            }
            if !doomed.is_empty() {
                debug!("bars: staff#{} removing {} left peaks", staff + 1, doomed.len());
                self.remove_peaks(staff, &doomed);
                self.delete_related_columns(&doomed);
            }
        }
    }

    /// In multi-staff systems, remove the peaks linked to no other peak.
    pub(super) fn purge_unaligned_bars(&mut self) {
        for staves in self.multi_staff_systems() {
            for staff in staves {
                let doomed: Vec<PeakId> = self.projectors[staff]
                    .peaks()
                    .iter()
                    .copied()
                    .filter(|&p| self.graph.contains(p) && !self.graph.has_links(p))
                    .collect();
                if !doomed.is_empty() {
                    debug!("bars: staff#{} removing {} unaligned peaks", staff + 1, doomed.len());
                    self.remove_peaks(staff, &doomed);
                }
            }
        }
    }

    /// In small systems, remove the bars extending too far above the first
    /// staff or below the last one.
    pub(super) fn purge_extending_peaks(&mut self) {
        let half_line = self.half_line();
        let max_extension = self.params.max_bar_extension as f64;
        let bounds: Vec<(usize, usize)> = self
            .systems
            .iter()
            .filter(|s| s.staves.len() < self.params.large_system_staff_count)
            .filter_map(|s| Some((s.first_staff()?, s.last_staff()?)))
            .collect();
        for (first, last) in bounds {
            for side in VerticalSide::ALL {
                let staff = match side {
                    VerticalSide::Top => first,
                    VerticalSide::Bottom => last,
                };
                let from = self.projectors[staff]
                    .start_peak_index(&self.graph)
                    .map_or(0, |i| i + 1);
                let doomed: Vec<PeakId> = self.projectors[staff].peaks()[from.min(self.projectors[staff].peaks().len())..]
                    .iter()
                    .copied()
                    .filter(|&p| self.graph.peak(p).extension(side, half_line) > max_extension)
                    .collect();
                if !doomed.is_empty() {
                    debug!("bars: staff#{} removing {} {:?}-extending peaks", staff + 1, doomed.len(), side);
                    self.remove_peaks(staff, &doomed);
                    self.delete_related_columns(&doomed);
                }
            }
        }
    }

    pub(super) fn refine_right_ends(&mut self) {
        for (staff, projector) in self.staves.staves_mut().iter_mut().zip(&self.projectors) {
            projector.refine_right_end(staff, &mut self.graph);
        }
    }

    /// Remove the C-clef look-alikes of every staff.
    pub(super) fn purge_c_clefs(&mut self) {
        let thresholds = CClefThresholds {
            min_peak1_width: self.params.min_peak1_width_for_c_clef,
            max_peak2_width: self.params.max_peak2_width_for_c_clef,
            max_double_bar_gap: self.params.max_double_bar_gap,
            min_measure_width: self.params.min_measure_width,
            tail: self.params.c_clef_tail,
        };
        for staff in 0..self.projectors.len() {
            let ids = self.projectors[staff].peaks().to_vec();
            let summaries: Vec<PeakSummary> = ids
                .iter()
                .map(|&id| {
                    let peak = self.graph.peak(id);
                    PeakSummary {
                        start: peak.start,
                        stop: peak.stop,
                        plain: !peak.is_staff_end(HorizontalSide::Left)
                            && !peak.is_staff_end(HorizontalSide::Right)
                            && !peak.is_brace()
                            && !peak.is_bracket(),
                        connected: self.graph.is_connected(id, VerticalSide::Top)
                            || self.graph.is_connected(id, VerticalSide::Bottom),
                    }
                })
                .collect();
            let staff_start = self.staves.staves()[staff].left().round() as i32;

            for found in find_c_clefs(&summaries, staff_start, &thresholds) {
                self.graph.peak_mut(ids[found.one]).set(PeakFlags::CCLEF_ONE);
                self.graph.peak_mut(ids[found.two]).set(PeakFlags::CCLEF_TWO);
                for &tail in &found.tails {
                    self.graph.peak_mut(ids[tail]).set(PeakFlags::CCLEF_TAIL);
                }
                let doomed: Vec<PeakId> = found.indices().map(|i| ids[i]).collect();
                debug!("bars: staff#{} C-clef peaks {:?}", staff + 1, doomed);
                self.remove_peaks(staff, &doomed);
                self.delete_related_columns(&doomed);
            }
        }
    }

    /// Flag every plain peak as thin or thick.
    ///
    /// Isolated peaks are thin. Within a group of close peaks, widths are
    /// split at mid-range when they differ enough, all thin otherwise.
    pub(super) fn partition_widths(&mut self) {
        let (isolated, groups) = self.group_bar_peaks();
        for peak in isolated {
            self.graph.peak_mut(peak).set(PeakFlags::THIN);
        }
        let interline = self.scale.interline() as f64;
        for group in groups {
            let widths: Vec<i32> = group.iter().map(|&p| self.graph.peak(p).width()).collect();
            let (Some(&min), Some(&max)) = (widths.iter().min(), widths.iter().max()) else {
                continue;
            };
            let normed_delta = (max - min) as f64 / interline;
            for (&peak, &width) in group.iter().zip(&widths) {
                let flag = if normed_delta >= self.params.min_normed_delta_width && width - min > max - width {
                    PeakFlags::THICK
                } else {
                    PeakFlags::THIN
                };
                self.graph.peak_mut(peak).set(flag);
            }
        }
    }

    /// Split plain peaks into isolated ones and groups of close ones.
    fn group_bar_peaks(&self) -> (Vec<PeakId>, Vec<Vec<PeakId>>) {
        let mut isolated = Vec::new();
        let mut groups: Vec<Vec<PeakId>> = Vec::new();
        for system in &self.systems {
            for &staff in &system.staves {
                let mut in_group = false;
                let mut prev: Option<PeakId> = None;
                for &id in self.projectors[staff].peaks() {
                    let peak = self.graph.peak(id);
                    if peak.is_brace() || peak.is_bracket() {
                        if let (false, Some(p)) = (in_group, prev) {
                            isolated.push(p);
                        }
                        in_group = false;
                        prev = None;
                        continue;
                    }
                    if let Some(p) = prev {
                        let gap = peak.start - self.graph.peak(p).stop - 1;
                        if gap <= self.params.max_double_bar_gap {
                            if !in_group {
                                groups.push(vec![p]);
                                in_group = true;
                            }
                            if let Some(group) = groups.last_mut() {
                                group.push(id);
                            }
                        } else if in_group {
                            in_group = false;
                        } else {
                            isolated.push(p);
                        }
                    }
                    prev = Some(id);
                }
                if let (false, Some(p)) = (in_group, prev) {
                    isolated.push(p);
                }
            }
        }
        (isolated, groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: CClefThresholds = CClefThresholds {
        min_peak1_width: 6,
        max_peak2_width: 6,
        max_double_bar_gap: 15,
        min_measure_width: 40,
        tail: 40,
    };

    fn plain(start: i32, stop: i32) -> PeakSummary {
        PeakSummary {
            start,
            stop,
            plain: true,
            connected: false,
        }
    }

    #[test]
    fn thick_then_thin_near_staff_start_is_a_clef() {
        let peaks = [plain(120, 127), plain(131, 134), plain(400, 402)];
        let found = find_c_clefs(&peaks, 100, &T);
        assert_eq!(
            found,
            vec![CClefMatch {
                one: 0,
                two: 1,
                tails: vec![]
            }]
        );
    }

    #[test]
    fn connected_peaks_are_barlines() {
        let mut peaks = [plain(120, 127), plain(131, 134)];
        peaks[0].connected = true;
        assert!(find_c_clefs(&peaks, 100, &T).is_empty());
        peaks[0].connected = false;
        peaks[1].connected = true;
        assert!(find_c_clefs(&peaks, 100, &T).is_empty());
    }

    #[test]
    fn connected_tail_cancels_the_match() {
        let mut peaks = [plain(120, 127), plain(131, 134), plain(150, 152)];
        assert_eq!(find_c_clefs(&peaks, 100, &T)[0].tails, vec![2]);
        peaks[2].connected = true;
        assert!(find_c_clefs(&peaks, 100, &T).is_empty());
    }

    #[test]
    fn measure_start_moves_past_regular_bars() {
        // A thin barline at 200 opens a measure; the pair right after it
        // must be beyond a double-bar gap to qualify.
        let peaks = [plain(200, 202), plain(210, 217), plain(221, 224)];
        assert!(find_c_clefs(&peaks, 100, &T).is_empty());
        let peaks = [plain(200, 202), plain(225, 232), plain(236, 239)];
        let found = find_c_clefs(&peaks, 100, &T);
        assert_eq!(found.len(), 1);
        assert_eq!((found[0].one, found[0].two), (1, 2));
    }

    #[test]
    fn staff_ends_are_not_clefs() {
        let mut peaks = [plain(120, 127), plain(131, 134)];
        peaks[0].plain = false;
        assert!(find_c_clefs(&peaks, 100, &T).is_empty());
    }
}
