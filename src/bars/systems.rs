//! Peaks, bar sticks, alignments, connections and systems.

use super::alignment::{best_of, BarAlignment, ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS};
use super::options::ProjectorParams;
use super::peak::{Peak, PeakFlags, PeakId};
use super::projector::StaffProjector;
use super::BarsRetriever;
use crate::filament::BarFilamentBuilder;
use crate::grade::GradeImpacts;
use crate::image::{vertical_core, BandLine, PixelSource};
use crate::sections::Section;
use crate::system::SystemInfo;
use crate::types::VerticalSide;
use log::{debug, info};
use nalgebra::Point2;
use std::collections::BTreeSet;

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Run the projector of every staff.
    pub(super) fn find_bar_peaks(&mut self) {
        let (width, height) = (self.source.width(), self.source.height());
        let switches = self.settings.switches;
        for (index, staff) in self.staves.staves().iter().enumerate() {
            let params = ProjectorParams::new(
                &self.settings.projector,
                &self.scale,
                staff.interline(),
                staff.is_one_line(),
                switches.one_line_barline_height.count(),
                switches.one_line_barline_height.has_half_start(),
            );
            let mut projector = StaffProjector::new(index, params, width, height);
            projector.process(staff, self.source, &self.skew, &mut self.graph);
            self.projectors.push(projector);
        }
        debug!("bars: {} peaks over {} staves", self.graph.peak_count(), self.projectors.len());
    }

    /// Bind a vertical filament to every peak; peaks without one are dropped.
    pub(super) fn build_bar_sticks(&mut self) {
        let max_width = self
            .graph
            .peaks()
            .filter(|p| !p.is_brace())
            .map(Peak::width)
            .max()
            .unwrap_or(0);
        let lags = self.lags;
        let builder = BarFilamentBuilder::new(&lags.vertical, max_width, self.graph_params.bar_step);
        let extension = self.graph_params.bracket_lookup_extension;

        for staff in 0..self.projectors.len() {
            let peaks = self.projectors[staff].peaks().to_vec();
            let mut orphans = Vec::new();
            for peak in peaks {
                match self.build_stick(&builder, peak, extension) {
                    Some(filament) => self.graph.peak_mut(peak).filament = Some(filament),
                    None => orphans.push(peak),
                }
            }
            if !orphans.is_empty() {
                debug!("bars: staff#{} {} peaks without stick", staff + 1, orphans.len());
                self.projectors[staff].remove_peaks(&mut self.graph, &orphans);
            }
        }
    }

    /// Flag as brace the peaks whose stick is too curved for a barline.
    pub(super) fn detect_curved_peaks(&mut self) {
        let min_radius = self.graph_params.min_bar_curvature as f64;
        let curved: Vec<PeakId> = self
            .graph
            .peaks()
            .filter(|p| p.filament.as_ref().is_some_and(|f| f.curvature_radius() < min_radius))
            .map(|p| p.id)
            .collect();
        for peak in curved {
            debug!("bars: curved {}", self.graph.peak(peak));
            self.graph.peak_mut(peak).set(PeakFlags::BRACE);
        }
    }

    /// Check whether `top` and `bottom` peaks, in adjacent staves, are
    /// abscissa-consistent.
    pub(super) fn check_alignment(
        &self,
        top: PeakId,
        bottom: PeakId,
        check_slope: bool,
        check_width: bool,
    ) -> Option<BarAlignment> {
        let (upper, lower) = (self.graph.peak(top), self.graph.peak(bottom));
        let dy = (lower.top - upper.bottom) as f64;
        if dy <= 0.0 {
            return None;
        }
        let vertical = self.skew.vertical_slope();
        let left = ((lower.start - upper.start) as f64 / dy - vertical).abs();
        let right = ((lower.stop - upper.stop) as f64 / dy - vertical).abs();
        let slope = left.min(right);
        let max_slope = self.graph_params.max_alignment_slope;
        if check_slope && slope > max_slope {
            return None;
        }

        let d_width = lower.width() - upper.width();
        let max_d_width = self.graph_params.max_alignment_delta_width;
        if check_width && d_width.abs() > max_d_width {
            return None;
        }

        let impacts = GradeImpacts::new(
            ALIGNMENT_IMPACT_NAMES,
            ALIGNMENT_IMPACT_WEIGHTS,
            vec![
                1.0 - slope / max_slope,
                1.0 - d_width.abs() as f64 / max_d_width as f64,
            ],
        );
        Some(BarAlignment::new(top, bottom, slope, d_width, impacts))
    }

    /// Brace portions are aligned when their deskewed middles match.
    pub(super) fn check_brace_alignment(&self, top: PeakId, bottom: PeakId) -> bool {
        let (upper, lower) = (self.graph.peak(top), self.graph.peak(bottom));
        let x1 = self.skew.deskewed(upper.mid() as f64, upper.bottom as f64).x;
        let x2 = self.skew.deskewed(lower.mid() as f64, lower.top as f64).x;
        (x2 - x1).abs() <= self.graph_params.max_alignment_brace_dx as f64
    }

    /// Promote the alignment `top -> bottom` to a connection when a
    /// concrete stroke joins the two peaks.
    pub(super) fn check_connection(&mut self, top: PeakId, bottom: PeakId) -> bool {
        let (upper, lower) = (self.graph.peak(top), self.graph.peak(bottom));
        let left = BandLine::new(
            Point2::new(upper.start as f64, upper.bottom as f64),
            Point2::new(lower.start as f64, lower.top as f64),
        );
        let right = BandLine::new(
            Point2::new(upper.stop as f64, upper.bottom as f64),
            Point2::new(lower.stop as f64, lower.top as f64),
        );
        let core = vertical_core(self.source, &left, &right);
        let max_gap = self.graph_params.max_connection_gap;
        let max_white = self.graph_params.max_connection_white_ratio;
        if core.gap > max_gap || core.white_ratio > max_white {
            return false;
        }
        let Some(alignment) = self.graph.remove_edge(top, bottom) else {
            return false;
        };
        let connection = alignment.into_connection(
            core.gap,
            core.white_ratio,
            1.0 - core.gap as f64 / max_gap as f64,
            1.0 - core.white_ratio / max_white,
        );
        debug!("bars: connection {} -> {}", top.0, bottom.0);
        self.graph.add_edge(connection);
        true
    }

    /// Staves adjacent to `staff` on `side`, provided they share its short
    /// status.
    fn linkable_neighbors(&self, staff: usize, side: VerticalSide) -> Vec<usize> {
        let neighbors = self.staves.vert_neighbors(staff, side);
        let short = self.staves.staves()[staff].is_short();
        match neighbors.first() {
            Some(&first) if self.staves.staves()[first].is_short() == short => neighbors,
            _ => Vec::new(),
        }
    }

    /// Align `peak` with the peaks of `other` staff, located on `side`.
    fn find_alignments_of(&mut self, peak: PeakId, other: usize, side: VerticalSide) -> Vec<(PeakId, PeakId)> {
        let mut found = Vec::new();
        for &candidate in self.projectors[other].peaks() {
            let (top, bottom) = match side {
                VerticalSide::Bottom => (peak, candidate),
                VerticalSide::Top => (candidate, peak),
            };
            if let Some(alignment) = self.check_alignment(top, bottom, true, true) {
                found.push(alignment);
            }
        }
        found
            .into_iter()
            .map(|alignment| {
                let key = (alignment.top, alignment.bottom);
                self.graph.add_edge(alignment);
                key
            })
            .collect()
    }

    pub(super) fn find_all_alignments(&mut self) {
        for staff in 0..self.projectors.len() {
            let below = self.linkable_neighbors(staff, VerticalSide::Bottom);
            if below.is_empty() {
                continue;
            }
            for peak in self.projectors[staff].peaks().to_vec() {
                for &other in &below {
                    self.find_alignments_of(peak, other, VerticalSide::Bottom);
                }
            }
        }
        debug!("bars: {} alignments", self.graph.edge_count());
    }

    pub(super) fn find_connections(&mut self) {
        let keys: Vec<(PeakId, PeakId)> = self.graph.edges().map(|e| (e.top, e.bottom)).collect();
        let count = keys
            .into_iter()
            .filter(|&(top, bottom)| self.check_connection(top, bottom))
            .count();
        debug!("bars: {} connections", count);
    }

    /// Links for a freshly created peak, on both vertical sides.
    fn find_alignments_and_connections_of(&mut self, peak: PeakId) {
        let staff = self.graph.peak(peak).staff;
        for side in VerticalSide::ALL {
            for other in self.linkable_neighbors(staff, side) {
                for (top, bottom) in self.find_alignments_of(peak, other, side) {
                    self.check_connection(top, bottom);
                }
            }
        }
    }

    /// Split the peaks aligned with several distinct peaks of a neighbour
    /// staff, until no such peak remains.
    pub(super) fn split_merged_groups(&mut self) {
        let all: Vec<PeakId> = self.graph.peaks().map(|p| p.id).collect();
        let mut to_split = self.peaks_to_split(&all);
        while !to_split.is_empty() {
            let mut impacted = Vec::new();
            for peak in to_split {
                if self.graph.contains(peak) {
                    self.split_peak(peak, &mut impacted);
                }
            }
            impacted.retain(|&p| self.graph.contains(p));
            to_split = self.peaks_to_split(&impacted);
        }
    }

    fn peaks_to_split(&self, peaks: &[PeakId]) -> Vec<PeakId> {
        peaks
            .iter()
            .copied()
            .filter(|&p| self.graph.contains(p) && !self.check_for_split(p).is_empty())
            .collect()
    }

    /// Run of close peaks around `seed` (peaks of one staff, left to right),
    /// extended on both sides while gaps stay small.
    fn group_of(&self, seed: &[PeakId]) -> Vec<PeakId> {
        let (Some(&first), Some(&last)) = (seed.first(), seed.last()) else {
            return Vec::new();
        };
        let staff = self.graph.peak(first).staff;
        let all = self.projectors[staff].peaks();
        let max_gap = self.graph_params.max_close_gap;
        let (Some(i1), Some(i2)) = (all.iter().position(|&p| p == first), all.iter().position(|&p| p == last))
        else {
            return seed.to_vec();
        };

        let mut i_min = i1;
        let mut prev = first;
        for i in (0..i1).rev() {
            let gap = self.graph.peak(prev).start - self.graph.peak(all[i]).stop + 1;
            if gap > max_gap {
                break;
            }
            i_min = i;
            prev = all[i];
        }

        let mut i_max = i2;
        prev = last;
        for (i, &peak) in all.iter().enumerate().skip(i2 + 1) {
            let gap = self.graph.peak(peak).start - self.graph.peak(prev).stop + 1;
            if gap > max_gap {
                break;
            }
            i_max = i;
            prev = peak;
        }
        all[i_min..=i_max.max(i_min)].to_vec()
    }

    /// Sides where `peak` is connected to two close peaks whose cumulated
    /// width or span matches its own, with those two partners.
    fn check_for_split(&self, peak: PeakId) -> Vec<(VerticalSide, Vec<PeakId>)> {
        let mut found = Vec::new();
        if self.group_of(&[peak]).len() > 1 {
            return found;
        }
        let p = self.graph.peak(peak);
        let width = p.width();
        for side in VerticalSide::ALL {
            let partners = self.group_of(&self.graph.connected_peaks(peak, side));
            if partners.len() != 2 {
                continue;
            }
            let (p1, p2) = (self.graph.peak(partners[0]), self.graph.peak(partners[1]));
            if width <= p1.width().max(p2.width()) + 2 {
                continue;
            }
            if p2.start - p1.stop + 1 > self.graph_params.max_close_gap {
                continue;
            }
            let total = p1.width() + p2.width();
            let span = p2.stop - p1.start + 1;
            let r_total = (total - width).abs() as f64 / total.max(width) as f64;
            let r_span = (span - width).abs() as f64 / span.max(width) as f64;
            if r_total.min(r_span) > self.graph_params.max_width_ratio {
                continue;
            }
            let ratio = p1.width() as f64 / total as f64;
            let mid = split_abscissa(p, ratio);
            if mid <= p.start + 1 || mid >= p.stop - 1 {
                debug!("bars: split of {} not feasible", p);
                continue;
            }
            found.push((side, partners));
        }
        found
    }

    /// Split `peak` in two sub-peaks, along the ratio of its partner widths.
    fn split_peak(&mut self, peak: PeakId, impacted: &mut Vec<PeakId>) -> bool {
        let splits = self.check_for_split(peak);
        if splits.is_empty() {
            return false;
        }

        let mut ratio: Option<f64> = None;
        for (_, partners) in &splits {
            for &p in partners {
                if !impacted.contains(&p) {
                    impacted.push(p);
                }
            }
            let w1 = self.graph.peak(partners[0]).width() as f64;
            let w2 = self.graph.peak(partners[partners.len() - 1]).width() as f64;
            let r = w1 / (w1 + w2);
            ratio = Some(ratio.map_or(r, |prev| (prev + r) / 2.0));
        }
        impacted.retain(|&p| p != peak);
        let Some(ratio) = ratio else {
            return false;
        };

        let old = self.graph.peak(peak).clone();
        let mid = split_abscissa(&old, ratio);
        let sections: Vec<Section> = old
            .filament
            .as_ref()
            .map(|f| f.sections().to_vec())
            .unwrap_or_default();
        let builder = BarFilamentBuilder::new(&sections, i32::MAX, self.graph_params.bar_step);
        let Some(left) = self.create_sub_peak(&old, old.start, mid - 1, &builder) else {
            return false;
        };
        let Some(right) = self.create_sub_peak(&old, mid + 1, old.stop, &builder) else {
            return false;
        };

        let staff = old.staff;
        let mut halves = Vec::with_capacity(2);
        for sub in [left, right] {
            let id = self.projectors[staff].insert_peak(&mut self.graph, sub, peak);
            self.find_alignments_and_connections_of(id);
            let mut touched = vec![id];
            touched.extend(self.graph.incoming(id).iter().map(|e| e.top));
            touched.extend(self.graph.outgoing(id).iter().map(|e| e.bottom));
            for p in touched {
                if !impacted.contains(&p) {
                    impacted.push(p);
                }
            }
            halves.push(id);
        }

        for (side, partners) in &splits {
            match side {
                VerticalSide::Top => self.prune_group_pair(partners, &halves),
                VerticalSide::Bottom => self.prune_group_pair(&halves, partners),
            }
        }

        info!("bars: split {} into #{} and #{}", old, halves[0].0, halves[1].0);
        self.projectors[staff].remove_peak(&mut self.graph, peak);
        impacted.retain(|&p| p != peak);
        true
    }

    fn create_sub_peak(&mut self, old: &Peak, start: i32, stop: i32, builder: &BarFilamentBuilder<'_>) -> Option<Peak> {
        let mut sub = Peak::new(old.staff, old.top, old.bottom, start, stop, old.impacts.clone(), &self.skew);
        let core = sub.bounds();
        let lookup = core.grow(0, self.graph_params.bracket_lookup_extension);
        let id = self.next_filament_id();
        sub.filament = Some(builder.build(id, &core, &lookup)?);
        Some(sub)
    }

    /// Keep only the links pairing `upper[i]` with `lower[i]`.
    fn prune_group_pair(&mut self, upper: &[PeakId], lower: &[PeakId]) {
        let mut doomed = BTreeSet::new();
        for (i, &top) in upper.iter().enumerate() {
            let partner = lower.get(i).copied();
            for edge in self.graph.outgoing(top) {
                if Some(edge.bottom) != partner {
                    doomed.insert((edge.top, edge.bottom));
                }
            }
        }
        for (i, &bottom) in lower.iter().enumerate() {
            let partner = upper.get(i).copied();
            for edge in self.graph.incoming(bottom) {
                if Some(edge.top) != partner {
                    doomed.insert((edge.top, edge.bottom));
                }
            }
        }
        self.graph.remove_edges(&doomed);
    }

    /// Keep at most one link per peak on each side.
    pub(super) fn purge_alignments(&mut self) {
        let mut doomed = BTreeSet::new();
        for peak in self.graph.peaks() {
            for side in VerticalSide::ALL {
                let links = self.graph.links(peak.id, side);
                if links.len() < 2 {
                    continue;
                }
                let best = best_of(&links, side.opposite()).map(|b| (b.top, b.bottom));
                for link in links {
                    let key = (link.top, link.bottom);
                    if Some(key) != best {
                        doomed.insert(key);
                    }
                }
            }
        }
        if !doomed.is_empty() {
            debug!("bars: purging {} alignments", doomed.len());
            self.graph.remove_edges(&doomed);
        }
    }

    /// Index of the top staff of the system each staff belongs to.
    pub(super) fn system_tops(&self) -> Vec<usize> {
        let mut tops: Vec<Option<usize>> = vec![None; self.staves.len()];
        let max_offset = self.graph_params.max_first_connection_x_offset;
        for connection in self.graph.connections() {
            let (upper, lower) = (self.graph.peak(connection.top), self.graph.peak(connection.bottom));
            let (top, bottom) = (upper.staff, lower.staff);
            if tops[top].is_none() {
                tops[top] = Some(top);
            }
            if tops[bottom].is_none() {
                let offset = lower.start - self.staves.staves()[bottom].left().round() as i32;
                if offset > max_offset
                    && (self.projectors[bottom].last_peak() == Some(connection.bottom)
                        || !self.are_right_connected(top, bottom))
                {
                    debug!("bars: staff#{} first connection too far right", bottom + 1);
                    continue;
                }
            }
            tops[bottom] = tops[top];
        }
        tops.into_iter()
            .enumerate()
            .map(|(i, top)| top.unwrap_or(i))
            .collect()
    }

    /// True when the last peaks of both staves are connected.
    fn are_right_connected(&self, top: usize, bottom: usize) -> bool {
        match (self.projectors[top].last_peak(), self.projectors[bottom].last_peak()) {
            (Some(upper), Some(lower)) => self.graph.edge(upper, lower).is_some_and(BarAlignment::is_connection),
            _ => false,
        }
    }

    pub(super) fn create_systems(&mut self, tops: &[usize]) {
        let mut current: Option<usize> = None;
        for (staff, &top) in tops.iter().enumerate() {
            match current {
                Some(t) if t >= top => {
                    if let Some(system) = self.systems.last_mut() {
                        system.staves.push(staff);
                    }
                }
                _ => {
                    current = Some(top);
                    let id = self.systems.len() as u32 + 1;
                    self.systems.push(SystemInfo::new(id, vec![staff]));
                }
            }
        }
        self.system_of = vec![0; self.staves.len()];
        for (index, system) in self.systems.iter().enumerate() {
            for &staff in &system.staves {
                self.system_of[staff] = index;
            }
        }
        info!("bars: {} systems", self.systems.len());
    }

    /// Drop the links crossing a system boundary.
    pub(super) fn purge_cross_alignments(&mut self) {
        let doomed: BTreeSet<(PeakId, PeakId)> = self
            .graph
            .edges()
            .filter(|e| {
                let (upper, lower) = (self.graph.peak(e.top), self.graph.peak(e.bottom));
                self.system_of[upper.staff] != self.system_of[lower.staff]
            })
            .map(|e| (e.top, e.bottom))
            .collect();
        if !doomed.is_empty() {
            debug!("bars: purging {} cross-system links", doomed.len());
            self.graph.remove_edges(&doomed);
        }
    }
}

/// Abscissa separating the two halves of a split peak.
fn split_abscissa(peak: &Peak, ratio: f64) -> i32 {
    peak.start + (peak.width() as f64 * ratio).round_ties_even() as i32
}
