//! Columns: peaks of one system stacked at a common abscissa.

use super::graph::PeakGraph;
use super::peak::PeakId;
use super::BarsRetriever;
use crate::image::PixelSource;
use crate::system::SystemInfo;
use crate::types::HorizontalSide;
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;

/// One slot per staff of the system, each holding at most one peak.
///
/// Derived values (abscissa, width, fullness) are computed from the live
/// peaks of the graph on every query; a slot whose peak was removed counts
/// as empty.
#[derive(Clone, Debug, Serialize)]
pub struct BarColumn {
    pub id: u32,
    /// Index of the system in the sheet.
    pub system: usize,
    slots: Vec<Option<PeakId>>,
}

impl BarColumn {
    pub fn new(id: u32, system: usize, staff_count: usize) -> Self {
        Self {
            id,
            system,
            slots: vec![None; staff_count],
        }
    }

    pub fn slots(&self) -> &[Option<PeakId>] {
        &self.slots
    }

    pub fn get(&self, position: usize) -> Option<PeakId> {
        self.slots.get(position).copied().flatten()
    }

    pub(crate) fn set(&mut self, position: usize, peak: Option<PeakId>) {
        if let Some(slot) = self.slots.get_mut(position) {
            *slot = peak;
        }
    }

    /// Empty the slot holding `peak`.
    pub(crate) fn clear(&mut self, peak: PeakId) {
        for slot in &mut self.slots {
            if *slot == Some(peak) {
                *slot = None;
            }
        }
    }

    /// Peaks held, top down.
    pub fn peaks(&self) -> Vec<PeakId> {
        self.slots.iter().flatten().copied().collect()
    }

    fn live_peaks<'g>(&self, graph: &'g PeakGraph) -> impl Iterator<Item = PeakId> + 'g {
        let ids = self.peaks();
        ids.into_iter().filter(move |&p| graph.contains(p))
    }

    /// True if every chain peak would land in an empty slot.
    pub fn can_include(&self, chain: &[PeakId], graph: &PeakGraph, system: &SystemInfo) -> bool {
        chain.iter().all(|&p| {
            system
                .position_of(graph.peak(p).staff)
                .is_some_and(|pos| self.get(pos).map_or(true, |q| !graph.contains(q)))
        })
    }

    /// Put the chain peaks in their staff slots.
    pub fn add_chain(&mut self, chain: &[PeakId], graph: &mut PeakGraph, system: &SystemInfo) {
        for &peak in chain {
            if let Some(position) = system.position_of(graph.peak(peak).staff) {
                self.set(position, Some(peak));
                graph.peak_mut(peak).column = Some(self.id);
            }
        }
    }

    /// Mean deskewed abscissa of the live peaks.
    pub fn x_dsk(&self, graph: &PeakGraph) -> f64 {
        mean(self.live_peaks(graph).map(|p| graph.peak(p).x_dsk))
    }

    /// Mean width of the live peaks.
    pub fn width(&self, graph: &PeakGraph) -> f64 {
        mean(self.live_peaks(graph).map(|p| graph.peak(p).width() as f64))
    }

    /// Every slot holds a live peak other than a brace.
    pub fn is_full(&self, graph: &PeakGraph) -> bool {
        self.slots
            .iter()
            .all(|s| s.is_some_and(|p| graph.contains(p) && !graph.peak(p).is_brace()))
    }

    /// Full, with every pair of consecutive peaks connected.
    pub fn is_fully_connected(&self, graph: &PeakGraph) -> bool {
        self.is_full(graph)
            && self.slots.windows(2).all(|pair| match (pair[0], pair[1]) {
                (Some(top), Some(bottom)) => graph.edge(top, bottom).is_some_and(|e| e.is_connection()),
                _ => false,
            })
    }

    /// Holds the peaks starting the staves.
    pub fn is_start(&self, graph: &PeakGraph) -> bool {
        self.live_peaks(graph)
            .any(|p| graph.peak(p).is_staff_end(HorizontalSide::Left))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Stack the connected peak sets of each system into columns.
    pub(super) fn build_columns(&mut self) {
        let mut chains: Vec<Vec<Vec<PeakId>>> = vec![Vec::new(); self.systems.len()];
        for set in self.graph.connected_sets() {
            let Some(&first) = set.first() else {
                continue;
            };
            let system = self.system_of[self.graph.peak(first).staff];
            chains[system].push(set);
        }

        self.columns = vec![Vec::new(); self.systems.len()];
        for (system, mut list) in chains.into_iter().enumerate() {
            list.sort_by(|a, b| {
                let (xa, xb) = (self.graph.peak(a[0]).x_dsk, self.graph.peak(b[0]).x_dsk);
                xa.partial_cmp(&xb).unwrap_or(Ordering::Equal)
            });
            for chain in list {
                let max_dx = self.params.max_column_dx as f64;
                let x = self.graph.peak(chain[0]).x_dsk;
                let info = &self.systems[system];
                let joins = self.columns[system].last().is_some_and(|column| {
                    (x - column.x_dsk(&self.graph)).abs() <= max_dx && column.can_include(&chain, &self.graph, info)
                });
                if !joins {
                    let column = BarColumn::new(self.next_column, system, info.staves.len());
                    self.next_column += 1;
                    self.columns[system].push(column);
                }
                if let Some(column) = self.columns[system].last_mut() {
                    column.add_chain(&chain, &mut self.graph, &self.systems[system]);
                }
            }
            debug!(
                "bars: system#{} {} columns, {} full",
                system + 1,
                self.columns[system].len(),
                self.columns[system].iter().filter(|c| c.is_full(&self.graph)).count()
            );
        }
    }

    /// Index of the start column of a system, if any.
    pub(super) fn start_column_index(&self, system: usize) -> Option<usize> {
        self.columns[system].iter().position(|c| c.is_start(&self.graph))
    }

    /// Select the start column of each system and set the left end of its
    /// staves.
    pub(super) fn detect_start_columns(&mut self) {
        'systems: for system in 0..self.systems.len() {
            let columns = &self.columns[system];
            let mut start: Option<usize> = None;
            for (i, column) in columns.iter().enumerate() {
                if !column.is_full(&self.graph) {
                    continue;
                }
                if let Some(s) = start {
                    let current = &columns[s];
                    let gap = (column.x_dsk(&self.graph) - column.width(&self.graph) / 2.0)
                        - (current.x_dsk(&self.graph) + current.width(&self.graph) / 2.0);
                    let max_gap = if i == 1 {
                        self.params.max_brace_bar_gap
                    } else {
                        self.params.max_double_bar_gap
                    };
                    if gap > max_gap as f64 {
                        break;
                    }
                }
                if column.is_fully_connected(&self.graph) {
                    start = Some(i);
                }
            }

            let Some(start) = start else {
                if self.systems[system].is_multi_staff() {
                    warn!("bars: no start column for multi-staff system#{}", system + 1);
                }
                continue;
            };
            let peaks = self.columns[system][start].peaks();
            for &id in &peaks {
                let peak = self.graph.peak(id);
                let x_left = self.staves.staves()[peak.staff].left().round() as i32;
                if peak.start - x_left > self.params.max_lines_left_to_start_bar {
                    debug!("bars: start {} too far inside staff", peak);
                    continue 'systems;
                }
                if self.projectors[peak.staff].has_standard_blank(peak.stop, x_left) {
                    debug!("bars: start {} too far ahead of staff", peak);
                    continue 'systems;
                }
            }
            for id in peaks {
                let (staff, stop) = {
                    let peak = self.graph.peak(id);
                    (peak.staff, peak.stop)
                };
                self.staves.staves_mut()[staff].set_abscissa(HorizontalSide::Left, stop as f64);
                self.graph.peak_mut(id).set_staff_end(HorizontalSide::Left);
            }
        }
    }

    /// Delete the non-full columns found right of the start column.
    pub(super) fn purge_partial_columns(&mut self) {
        for system in 0..self.systems.len() {
            let first = self.start_column_index(system).map_or(0, |i| i + 1);
            let mut i = first;
            while i < self.columns[system].len() {
                if self.columns[system][i].is_full(&self.graph) {
                    i += 1;
                    continue;
                }
                let column = self.columns[system].remove(i);
                debug!("bars: deleting partial column#{}", column.id);
                for peak in column.peaks() {
                    if self.graph.contains(peak) {
                        let staff = self.graph.peak(peak).staff;
                        self.projectors[staff].remove_peak(&mut self.graph, peak);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::alignment::{ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS};
    use crate::bars::{BarAlignment, Peak, PeakFlags};
    use crate::grade::GradeImpacts;
    use crate::skew::Skew;

    fn stack(graph: &mut PeakGraph, x: i32, staves: usize) -> Vec<PeakId> {
        (0..staves)
            .map(|staff| {
                let top = 100 + 200 * staff as i32;
                graph.add_peak(Peak::new(staff, top, top + 80, x, x + 2, None, &Skew::default()))
            })
            .collect()
    }

    fn link(top: PeakId, bottom: PeakId) -> BarAlignment {
        let impacts = GradeImpacts::new(ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS, vec![1.0, 1.0]);
        BarAlignment::new(top, bottom, 0.0, 0, impacts)
    }

    #[test]
    fn fullness_and_connectivity() {
        let mut graph = PeakGraph::new();
        let system = SystemInfo::new(1, vec![0, 1, 2]);
        let ids = stack(&mut graph, 300, 3);
        graph.add_edge(link(ids[0], ids[1]).into_connection(0, 0.0, 1.0, 1.0));
        graph.add_edge(link(ids[1], ids[2]));

        let mut column = BarColumn::new(1, 0, 3);
        assert!(column.can_include(&ids, &graph, &system));
        column.add_chain(&ids[..2], &mut graph, &system);
        assert!(!column.is_full(&graph));
        assert!(!column.can_include(&ids[1..], &graph, &system));
        column.add_chain(&ids[2..], &mut graph, &system);
        assert!(column.is_full(&graph));
        assert!(!column.is_fully_connected(&graph));
        assert_eq!(graph.peak(ids[2]).column, Some(1));
        assert!((column.x_dsk(&graph) - 301.0).abs() < 1e-9);
        assert!((column.width(&graph) - 3.0).abs() < 1e-9);

        graph.add_edge(link(ids[1], ids[2]).into_connection(0, 0.0, 1.0, 1.0));
        assert!(column.is_fully_connected(&graph));
        // Queries do not mutate.
        assert!(column.is_fully_connected(&graph));
    }

    #[test]
    fn removed_peak_breaks_fullness() {
        let mut graph = PeakGraph::new();
        let system = SystemInfo::new(1, vec![0, 1]);
        let ids = stack(&mut graph, 50, 2);
        let mut column = BarColumn::new(7, 0, 2);
        column.add_chain(&ids, &mut graph, &system);
        assert!(column.is_full(&graph));
        graph.remove_peak(ids[1]);
        assert!(!column.is_full(&graph));
        assert!(!column.is_fully_connected(&graph));
        assert!(column.can_include(&ids[1..], &graph, &system));
        column.clear(ids[0]);
        assert_eq!(column.peaks(), vec![ids[1]]);
    }

    #[test]
    fn brace_slots_are_not_filled() {
        let mut graph = PeakGraph::new();
        let system = SystemInfo::new(1, vec![0, 1]);
        let ids = stack(&mut graph, 20, 2);
        graph.add_edge(link(ids[0], ids[1]).into_connection(0, 0.0, 1.0, 1.0));
        let mut column = BarColumn::new(3, 0, 2);
        column.add_chain(&ids, &mut graph, &system);
        assert!(column.is_fully_connected(&graph));

        for &id in &ids {
            graph.peak_mut(id).set(PeakFlags::BRACE);
        }
        assert!(!column.is_full(&graph));
        assert!(!column.is_fully_connected(&graph));

        graph.peak_mut(ids[0]).unset(PeakFlags::BRACE);
        graph.peak_mut(ids[1]).unset(PeakFlags::BRACE);
        graph.peak_mut(ids[1]).set(PeakFlags::BRACE_BOTTOM);
        assert!(!column.is_full(&graph));
    }

    #[test]
    fn start_flag_comes_from_peaks() {
        let mut graph = PeakGraph::new();
        let system = SystemInfo::new(1, vec![0]);
        let ids = stack(&mut graph, 10, 1);
        let mut column = BarColumn::new(1, 0, 1);
        column.add_chain(&ids, &mut graph, &system);
        assert!(!column.is_start(&graph));
        graph.peak_mut(ids[0]).set_staff_end(HorizontalSide::Left);
        assert!(column.is_start(&graph));
    }
}
