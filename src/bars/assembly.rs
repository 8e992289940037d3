//! Interpretations, part groups and parts.

use super::peak::{Peak, PeakFlags, PeakId};
use super::BarsRetriever;
use crate::grade::GradeImpacts;
use crate::image::PixelSource;
use crate::sig::{BracketKind, Inter, InterId, InterKind, Relation};
use crate::staff::StaffId;
use crate::system::{GroupSymbol, Part, PartGroup};
use crate::types::{HorizontalSide, Rect, VerticalSide};
use log::{debug, info, warn};
use nalgebra::Point2;
use std::collections::{BTreeMap, BTreeSet};

/// Vertical extent of a bracket portion.
fn bracket_kind(peak: &Peak) -> BracketKind {
    if peak.is(PeakFlags::BRACKET_MIDDLE) {
        return BracketKind::None;
    }
    match (peak.is_bracket_end(VerticalSide::Top), peak.is_bracket_end(VerticalSide::Bottom)) {
        (true, true) => BracketKind::Both,
        (true, false) => BracketKind::Top,
        (false, true) => BracketKind::Bottom,
        (false, false) => BracketKind::None,
    }
}

impl<P: PixelSource + ?Sized> BarsRetriever<'_, P> {
    /// Promote every retained non-brace peak to a barline or bracket
    /// interpretation in the sig of its system.
    pub(super) fn create_inters(&mut self) {
        let half_line = self.scale.line_thickness / 2.0;
        for system in 0..self.systems.len() {
            for staff in self.systems[system].staves.clone() {
                for &id in self.projectors[staff].peaks() {
                    let peak = self.graph.peak(id);
                    if peak.is_brace() {
                        continue;
                    }
                    let x = peak.start as f64 + peak.width() as f64 / 2.0;
                    let top = Point2::new(x, peak.top as f64 - half_line + 0.5);
                    let bottom = Point2::new(x, peak.bottom as f64 + half_line + 0.5);
                    let bounds = peak.filament.as_ref().map_or_else(|| peak.bounds(), |f| f.bounds());

                    let kind = if peak.is_bracket() {
                        InterKind::Bracket {
                            kind: bracket_kind(peak),
                        }
                    } else {
                        InterKind::Barline {
                            thick: peak.is(PeakFlags::THICK),
                        }
                    };
                    let mut inter = Inter::new(kind, bounds, peak.grade())
                        .with_staff(staff)
                        .with_median(top, bottom, peak.width() as f64);
                    if let Some(impacts) = &peak.impacts {
                        inter = inter.with_impacts(impacts.clone());
                    }
                    if !peak.is_bracket() {
                        for side in HorizontalSide::ALL {
                            if peak.is_staff_end(side) {
                                inter.staff_end = Some(side);
                            }
                        }
                    }
                    let inter_id = self.systems[system].sig.add_vertex(inter);
                    self.graph.peak_mut(id).inter = Some(inter_id);
                }
            }
        }
    }

    /// Create a connector interpretation for every connection not starting
    /// from a brace, related to the barlines or brackets it joins.
    pub(super) fn create_connection_inters(&mut self) {
        let connections: Vec<(PeakId, PeakId, f64, GradeImpacts)> = self
            .graph
            .connections()
            .into_iter()
            .map(|c| (c.top, c.bottom, c.link_impacts().grade(), c.link_impacts().clone()))
            .collect();

        for (top_id, bottom_id, grade, impacts) in connections {
            let (top, bottom) = (self.graph.peak(top_id), self.graph.peak(bottom_id));
            if top.is_brace() {
                continue;
            }
            let system = self.system_of[top.staff];
            let kind = if top.is_bracket() {
                InterKind::BracketConnector
            } else {
                InterKind::BarConnector {
                    thick: top.is(PeakFlags::THICK),
                }
            };
            let bounds = Rect::from_corners(
                top.start.min(bottom.start),
                top.bottom,
                top.stop.max(bottom.stop),
                bottom.top,
            );
            let (top_inter, bottom_inter) = (top.inter, bottom.inter);

            let sig = &mut self.systems[system].sig;
            let connector = sig.add_vertex(Inter::new(kind, bounds, grade).with_impacts(impacts));
            if let Some(t) = top_inter {
                sig.add_edge(t, connector, Relation::NoExclusion);
            }
            let (Some(t), Some(b)) = (top_inter, bottom_inter) else {
                debug!("bars: no connection inter for {:?}-{:?}", top_id, bottom_id);
                continue;
            };
            sig.add_edge(connector, b, Relation::NoExclusion);
            sig.add_edge(t, b, Relation::BarConnection { grade });
            if matches!(kind, InterKind::BarConnector { .. }) && sig.inter(connector).is_good() {
                sig.freeze(connector);
                self.extend_connection(top_id);
            }
        }
    }

    /// Freeze the interpretations of every peak linked, directly or not, to
    /// a barline peak holding a good connection.
    fn extend_connection(&mut self, top: PeakId) {
        if self.graph.peak(top).is_bracket() {
            return;
        }
        let mut list = vec![top];
        let mut i = 0;
        while i < list.len() {
            let peak = list[i];
            let neighbors: Vec<PeakId> = self
                .graph
                .incoming(peak)
                .into_iter()
                .chain(self.graph.outgoing(peak))
                .flat_map(|e| [e.top, e.bottom])
                .collect();
            for p in neighbors {
                if !list.contains(&p) {
                    list.push(p);
                }
            }
            i += 1;
        }
        for peak in list {
            let p = self.graph.peak(peak);
            if let Some(inter) = p.inter {
                let system = self.system_of[p.staff];
                self.systems[system].sig.freeze(inter);
            }
        }
    }

    /// Relate consecutive barlines of a staff closer than a double-bar gap.
    pub(super) fn group_barlines(&mut self) {
        let interline = self.scale.interline() as f64;
        for system in 0..self.systems.len() {
            let mut pairs: Vec<(InterId, InterId, f64)> = Vec::new();
            for &staff in &self.systems[system].staves {
                let mut prev: Option<&Peak> = None;
                for &id in self.projectors[staff].peaks() {
                    let peak = self.graph.peak(id);
                    if peak.is_brace() || peak.is_bracket() {
                        continue;
                    }
                    if let Some(p) = prev {
                        let gap = peak.start - p.stop - 1;
                        if gap <= self.params.max_double_bar_gap {
                            if let (Some(a), Some(b)) = (p.inter, peak.inter) {
                                pairs.push((a, b, gap as f64 / interline));
                            }
                        }
                    }
                    prev = Some(peak);
                }
            }
            let sig = &mut self.systems[system].sig;
            for (a, b, gap) in pairs {
                sig.add_edge(a, b, Relation::BarGroup { gap });
            }
        }
    }

    /// Record on each staff its barline interpretations.
    pub(super) fn record_bars(&mut self) {
        for (staff, projector) in self.projectors.iter().enumerate() {
            let Some(system) = self.system_of.get(staff).map(|&s| &self.systems[s]) else {
                continue;
            };
            let bars: Vec<InterId> = projector
                .peaks()
                .iter()
                .filter_map(|&p| self.graph.peak(p).inter)
                .filter(|&i| matches!(system.sig.inter(i).kind, InterKind::Barline { .. }))
                .collect();
            self.staves.staves_mut()[staff].set_barlines(bars);
        }
    }

    /// True if a connection leaves `staff` on `side` right of its start
    /// peak.
    fn is_part_connected(&self, staff: usize, side: VerticalSide) -> bool {
        let projector = &self.projectors[staff];
        let Some(i_start) = projector.start_peak_index(&self.graph) else {
            return false;
        };
        let start = self.graph.peak(projector.peaks()[i_start]).start;
        let opposite = side.opposite();
        self.graph.connections().into_iter().any(|c| {
            let peak = self.graph.peak(c.peak(opposite));
            peak.staff == staff && peak.start > start
        })
    }

    /// Build the part groups of each system from the peaks left of the start
    /// peaks: brackets by their end serifs, squares by their connection
    /// pattern, braces by their portions.
    pub(super) fn create_groups(&mut self) {
        for system in 0..self.systems.len() {
            let mut groups: Vec<PartGroup> = Vec::new();
            let mut active: BTreeMap<usize, usize> = BTreeMap::new();
            for staff in self.systems[system].staves.clone() {
                let projector = &self.projectors[staff];
                let Some(i_start) = projector.start_peak_index(&self.graph) else {
                    debug!("bars: staff#{} one-staff system", staff + 1);
                    continue;
                };
                let staff_id = self.staves.staves()[staff].id;
                let below = self.is_part_connected(staff, VerticalSide::Bottom);
                let mut level = 0;

                for &id in projector.peaks()[..i_start].iter().rev() {
                    let peak = self.graph.peak(id);
                    if peak.is_brace() {
                        break;
                    }
                    level += 1;
                    let top_conn = self.graph.is_connected(id, VerticalSide::Top);
                    let bottom_conn = self.graph.is_connected(id, VerticalSide::Bottom);
                    if peak.is_bracket() {
                        if peak.is_bracket_end(VerticalSide::Top) {
                            active.insert(level, groups.len());
                            groups.push(PartGroup::new(level, GroupSymbol::Bracket, below, staff_id));
                        } else if let Some(&g) = active.get(&level) {
                            groups[g].last_staff = staff_id;
                            if peak.is_bracket_end(VerticalSide::Bottom) {
                                active.remove(&level);
                            }
                        } else {
                            warn!("bars: staff#{} no bracket group at level {}", staff + 1, level);
                        }
                    } else if !top_conn && bottom_conn {
                        active.insert(level, groups.len());
                        groups.push(PartGroup::new(level, GroupSymbol::Square, below, staff_id));
                    } else if top_conn {
                        if let Some(&g) = active.get(&level) {
                            groups[g].last_staff = staff_id;
                            if !bottom_conn {
                                active.remove(&level);
                            }
                        } else {
                            warn!("bars: staff#{} no square group at level {}", staff + 1, level);
                        }
                    } else {
                        warn!("bars: staff#{} weird square portion {}", staff + 1, peak);
                    }
                }

                let Some(brace) = projector.brace_peak() else {
                    continue;
                };
                level += 1;
                let brace = self.graph.peak(brace);
                if brace.is_brace_end(VerticalSide::Top) {
                    active.insert(level, groups.len());
                    groups.push(PartGroup::new(level, GroupSymbol::Brace, below, staff_id));
                } else if let Some(&g) = active.get(&level) {
                    groups[g].last_staff = staff_id;
                    if brace.is_brace_end(VerticalSide::Bottom) {
                        active.remove(&level);
                    }
                } else {
                    info!("bars: no brace partner at level {} for {}", level, brace);
                }
            }
            for group in &groups {
                debug!("bars: system#{} {}", system + 1, group);
            }
            self.systems[system].groups = groups;
        }
    }

    /// A brace over exactly two staves, connected between them and not
    /// connected above or below.
    fn is_true_brace_group(&self, group: &PartGroup) -> bool {
        if group.symbol != GroupSymbol::Brace || group.staff_count() != 2 {
            return false;
        }
        let (Some(first), Some(last)) = (
            self.staves.index_of(group.first_staff),
            self.staves.index_of(group.last_staff),
        ) else {
            return false;
        };
        !self.is_part_connected(first, VerticalSide::Top)
            && self.is_part_connected(first, VerticalSide::Bottom)
            && !self.is_part_connected(last, VerticalSide::Bottom)
    }

    /// Partition the staves of each system into parts.
    ///
    /// True brace groups make two-staff parts and are no longer kept as
    /// groups; every other staff is a part of its own, unless a single part
    /// is forced on a two-staff system.
    pub(super) fn create_parts(&mut self) {
        let switches = self.settings.switches;
        for system in 0..self.systems.len() {
            let braced: BTreeSet<(StaffId, StaffId)> = if switches.force_separate_parts {
                BTreeSet::new()
            } else {
                self.systems[system]
                    .groups
                    .iter()
                    .filter(|g| self.is_true_brace_group(g))
                    .map(|g| (g.first_staff, g.last_staff))
                    .collect()
            };

            let count = self.systems[system].staves.len();
            let position = |id: StaffId| {
                self.staves
                    .index_of(id)
                    .and_then(|staff| self.systems[system].position_of(staff))
            };
            let mut ranges: Vec<(usize, usize)> = Vec::new();
            let mut next = 0;
            for &(first, last) in &braced {
                let (Some(first), Some(last)) = (position(first), position(last)) else {
                    continue;
                };
                ranges.extend((next..first).map(|p| (p, p)));
                ranges.push((first, last));
                next = last + 1;
            }
            if switches.force_single_part && count == 2 && braced.is_empty() {
                ranges.push((0, 1));
            } else {
                ranges.extend((next..count).map(|p| (p, p)));
            }

            for (first, last) in ranges {
                self.create_part(system, first, last);
            }
            self.systems[system]
                .groups
                .retain(|g| !braced.contains(&(g.first_staff, g.last_staff)));
            for group in &self.systems[system].groups {
                debug!("bars: system#{} keeps {}", system + 1, group);
            }
        }
    }

    /// Append a part over system positions `first..=last`, clipped after
    /// the last part already created.
    fn create_part(&mut self, system: usize, first: usize, last: usize) {
        let info = &self.systems[system];
        let mut first = first;
        if let Some(latest) = info.parts.last().and_then(Part::last_staff) {
            let Some(latest) = self.staves.index_of(latest).and_then(|s| info.position_of(s)) else {
                return;
            };
            if last <= latest {
                return;
            }
            first = first.max(latest + 1);
        }

        let staves: Vec<usize> = info.staves[first..=last].to_vec();
        let mut part = Part {
            id: info.parts.len() as u32 + 1,
            staves: staves.iter().map(|&s| self.staves.staves()[s].id).collect(),
            merged: false,
        };
        if info.staves.len() == 2 && staves.len() == 2 {
            let (upper, lower) = (&self.staves.staves()[staves[0]], &self.staves.staves()[staves[1]]);
            let x = upper.left().max(lower.left());
            let gutter = lower.first_line().y_at(x) - upper.last_line().y_at(x);
            if gutter < self.params.min_separate_staff_gutter as f64 {
                part.merged = true;
                info!("bars: system#{} {} is a merged grand staff", info.id, part);
            }
        }
        self.systems[system].parts.push(part);
    }

    pub(super) fn contextualize(&mut self) {
        for system in &mut self.systems {
            system.sig.contextualize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skew::Skew;

    #[test]
    fn bracket_kinds_follow_flags() {
        let mut peak = Peak::new(0, 0, 80, 10, 14, None, &Skew::default());
        peak.set(PeakFlags::BRACKET_TOP);
        assert_eq!(bracket_kind(&peak), BracketKind::Top);
        peak.set(PeakFlags::BRACKET_BOTTOM);
        assert_eq!(bracket_kind(&peak), BracketKind::Both);
        peak.unset(PeakFlags::BRACKET_TOP);
        assert_eq!(bracket_kind(&peak), BracketKind::Bottom);
        peak.set(PeakFlags::BRACKET_MIDDLE);
        assert_eq!(bracket_kind(&peak), BracketKind::None);
    }
}
