//! Directed graph of peaks linked across vertically adjacent staves.
//!
//! Peaks live in an arena owned by the graph; removing a peak marks it dead
//! and drops every link touching it. Links always go from the upper peak to
//! the lower one, at most one link per pair.

use super::alignment::BarAlignment;
use super::peak::{Peak, PeakId};
use crate::types::VerticalSide;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, Default)]
pub struct PeakGraph {
    peaks: Vec<Peak>,
    live: Vec<bool>,
    edges: BTreeMap<(PeakId, PeakId), BarAlignment>,
}

impl PeakGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peak, assigning its id.
    pub fn add_peak(&mut self, mut peak: Peak) -> PeakId {
        let id = PeakId(self.peaks.len() as u32);
        peak.id = id;
        self.peaks.push(peak);
        self.live.push(true);
        id
    }

    pub fn peak(&self, id: PeakId) -> &Peak {
        &self.peaks[id.index()]
    }

    pub fn peak_mut(&mut self, id: PeakId) -> &mut Peak {
        &mut self.peaks[id.index()]
    }

    pub fn contains(&self, id: PeakId) -> bool {
        self.live.get(id.index()).copied().unwrap_or(false)
    }

    /// Live peaks, in creation order.
    pub fn peaks(&self) -> impl Iterator<Item = &Peak> + '_ {
        self.peaks.iter().filter(|p| self.live[p.id.index()])
    }

    pub fn peak_count(&self) -> usize {
        self.live.iter().filter(|&&l| l).count()
    }

    pub fn remove_peak(&mut self, id: PeakId) {
        if let Some(live) = self.live.get_mut(id.index()) {
            *live = false;
        }
        self.edges.retain(|&(top, bottom), _| top != id && bottom != id);
    }

    /// Insert a link, replacing any link between the same peaks.
    pub fn add_edge(&mut self, link: BarAlignment) {
        if self.contains(link.top) && self.contains(link.bottom) {
            self.edges.insert((link.top, link.bottom), link);
        }
    }

    pub fn remove_edge(&mut self, top: PeakId, bottom: PeakId) -> Option<BarAlignment> {
        self.edges.remove(&(top, bottom))
    }

    pub fn edge(&self, top: PeakId, bottom: PeakId) -> Option<&BarAlignment> {
        self.edges.get(&(top, bottom))
    }

    pub fn edges(&self) -> impl Iterator<Item = &BarAlignment> + '_ {
        self.edges.values()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Links reaching `id` from above.
    pub fn incoming(&self, id: PeakId) -> Vec<&BarAlignment> {
        self.edges.values().filter(|e| e.bottom == id).collect()
    }

    /// Links leaving `id` downwards.
    pub fn outgoing(&self, id: PeakId) -> Vec<&BarAlignment> {
        self.edges.values().filter(|e| e.top == id).collect()
    }

    /// Links on the given side of `id`.
    pub fn links(&self, id: PeakId, side: VerticalSide) -> Vec<&BarAlignment> {
        match side {
            VerticalSide::Top => self.incoming(id),
            VerticalSide::Bottom => self.outgoing(id),
        }
    }

    pub fn has_links(&self, id: PeakId) -> bool {
        self.edges.values().any(|e| e.top == id || e.bottom == id)
    }

    /// True if `id` is connected (not merely aligned) on `side`.
    pub fn is_connected(&self, id: PeakId, side: VerticalSide) -> bool {
        self.links(id, side).iter().any(|e| e.is_connection())
    }

    /// Peaks connected to `id` on `side`, by increasing abscissa.
    pub fn connected_peaks(&self, id: PeakId, side: VerticalSide) -> Vec<PeakId> {
        let mut peaks: Vec<PeakId> = self
            .links(id, side)
            .iter()
            .filter(|e| e.is_connection())
            .map(|e| e.peak(side))
            .collect();
        peaks.sort_by_key(|&p| (self.peak(p).start, p));
        peaks
    }

    /// Connections ordered by top staff, then top abscissa.
    pub fn connections(&self) -> Vec<&BarAlignment> {
        let mut list: Vec<&BarAlignment> = self.edges.values().filter(|e| e.is_connection()).collect();
        list.sort_by_key(|e| {
            let top = self.peak(e.top);
            (top.staff, top.start, e.bottom)
        });
        list
    }

    /// Connected components of live peaks, isolated peaks included.
    ///
    /// Each set is ordered by staff then abscissa; sets are ordered by their
    /// smallest peak id.
    pub fn connected_sets(&self) -> Vec<Vec<PeakId>> {
        let mut parent: Vec<usize> = (0..self.peaks.len()).collect();
        fn root(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }
        for &(top, bottom) in self.edges.keys() {
            let a = root(&mut parent, top.index());
            let b = root(&mut parent, bottom.index());
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }
        let mut sets: BTreeMap<usize, Vec<PeakId>> = BTreeMap::new();
        for peak in self.peaks() {
            let r = root(&mut parent, peak.id.index());
            sets.entry(r).or_default().push(peak.id);
        }
        sets.into_values()
            .map(|mut set| {
                set.sort_by_key(|&p| {
                    let peak = self.peak(p);
                    (peak.staff, peak.start)
                });
                set
            })
            .collect()
    }

    /// Drop every link listed.
    pub fn remove_edges(&mut self, links: &BTreeSet<(PeakId, PeakId)>) {
        self.edges.retain(|key, _| !links.contains(key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bars::alignment::{ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS};
    use crate::grade::GradeImpacts;
    use crate::skew::Skew;

    fn graph_with(peaks: &[(usize, i32)]) -> (PeakGraph, Vec<PeakId>) {
        let mut graph = PeakGraph::new();
        let ids = peaks
            .iter()
            .map(|&(staff, x)| {
                let top = 100 + 200 * staff as i32;
                graph.add_peak(Peak::new(staff, top, top + 80, x, x + 2, None, &Skew::default()))
            })
            .collect();
        (graph, ids)
    }

    fn link(top: PeakId, bottom: PeakId) -> BarAlignment {
        let impacts = GradeImpacts::new(ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS, vec![1.0, 1.0]);
        BarAlignment::new(top, bottom, 0.0, 0, impacts)
    }

    #[test]
    fn components_include_isolated_peaks() {
        let (mut graph, ids) = graph_with(&[(0, 100), (1, 100), (2, 101), (0, 500), (1, 800)]);
        graph.add_edge(link(ids[0], ids[1]));
        graph.add_edge(link(ids[1], ids[2]).into_connection(0, 0.0, 1.0, 1.0));
        let sets = graph.connected_sets();
        assert_eq!(sets, vec![vec![ids[0], ids[1], ids[2]], vec![ids[3]], vec![ids[4]]]);
        assert!(graph.is_connected(ids[1], VerticalSide::Bottom));
        assert!(!graph.is_connected(ids[1], VerticalSide::Top));
        assert_eq!(graph.connected_peaks(ids[2], VerticalSide::Top), vec![ids[1]]);
        assert_eq!(graph.connections().len(), 1);
    }

    #[test]
    fn removing_a_peak_drops_its_links() {
        let (mut graph, ids) = graph_with(&[(0, 100), (1, 100), (2, 100)]);
        graph.add_edge(link(ids[0], ids[1]));
        graph.add_edge(link(ids[1], ids[2]));
        graph.remove_peak(ids[1]);
        assert!(!graph.contains(ids[1]));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.peak_count(), 2);
        assert_eq!(graph.connected_sets().len(), 2);
        // Links to dead peaks are refused.
        graph.add_edge(link(ids[0], ids[1]));
        assert_eq!(graph.edge_count(), 0);
    }
}
