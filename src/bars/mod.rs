//! Barlines, brackets, braces, systems, parts and groups.
//!
//! Overview
//! - Each staff is analysed by a [`StaffProjector`] which emits the
//!   [`Peak`]s of its projection; peaks live in a [`PeakGraph`].
//! - Peaks of vertically adjacent staves are linked by alignments, promoted
//!   to connections when a concrete stroke joins them; connections define
//!   the systems.
//! - Connected peaks are stacked into [`BarColumn`]s; the start column of a
//!   system sets the left end of its staves.
//! - Purge passes then drop partial columns, stray peaks, C-clef look-alikes
//!   and unaligned bars, while braces and brackets are recognised left of
//!   the start column.
//! - Retained peaks become interpretations in the system [`Sig`], and
//!   bracket/brace/square patterns yield the part groups and parts.
//!
//! [`Sig`]: crate::sig::Sig

mod alignment;
mod assembly;
mod braces;
mod brackets;
mod columns;
mod graph;
mod options;
mod peak;
mod projector;
mod purge;
mod systems;

pub use alignment::{best_of, BarAlignment, LinkKind};
pub use columns::BarColumn;
pub use graph::PeakGraph;
pub use options::{BarsOptions, PeakGraphOptions, ProjectorOptions};
pub use peak::{Peak, PeakFlags, PeakId};
pub use projector::{Blank, StaffProjector};
pub use purge::{find_c_clefs, CClefMatch, CClefThresholds, PeakSummary};

use self::options::{BarsParams, PeakGraphParams};
use crate::diagnostics::{StopWatch, TimingBreakdown};
use crate::error::{GridError, Result};
use crate::filament::{BarFilamentBuilder, Filament, FilamentId};
use crate::image::PixelSource;
use crate::scale::Scale;
use crate::sections::Lags;
use crate::skew::Skew;
use crate::staff::StaffManager;
use crate::switches::ProcessingSwitches;
use crate::system::SystemInfo;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Every option read by the bars retriever.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BarsSettings {
    pub projector: ProjectorOptions,
    pub peak_graph: PeakGraphOptions,
    pub bars: BarsOptions,
    pub switches: ProcessingSwitches,
}

/// Result of the bars retrieval on one sheet.
#[derive(Clone, Debug)]
pub struct BarsOutcome {
    /// Staves with their refined left and right ends.
    pub staves: StaffManager,
    pub systems: Vec<SystemInfo>,
    pub graph: PeakGraph,
    /// Retained peaks, per staff, left to right.
    pub staff_peaks: Vec<Vec<PeakId>>,
    /// Brace portion of each staff, if any.
    pub brace_peaks: Vec<Option<PeakId>>,
    /// Surviving columns, per system.
    pub columns: Vec<Vec<BarColumn>>,
    pub timings: TimingBreakdown,
}

impl BarsOutcome {
    /// Retained peaks of `staff`, left to right.
    pub fn peaks_of(&self, staff: usize) -> impl Iterator<Item = &Peak> + '_ {
        self.staff_peaks
            .get(staff)
            .into_iter()
            .flatten()
            .map(|&id| self.graph.peak(id))
    }

    /// Index of the system holding `staff`.
    pub fn system_of(&self, staff: usize) -> Option<usize> {
        self.systems.iter().position(|s| s.contains(staff))
    }
}

/// Retrieves barlines, systems, parts and groups from the staves of a sheet.
pub struct BarsRetriever<'a, P: PixelSource + ?Sized> {
    source: &'a P,
    lags: &'a Lags,
    scale: Scale,
    skew: Skew,
    settings: BarsSettings,
    graph_params: PeakGraphParams,
    params: BarsParams,
    staves: StaffManager,
    projectors: Vec<StaffProjector>,
    graph: PeakGraph,
    systems: Vec<SystemInfo>,
    /// System index of each staff.
    system_of: Vec<usize>,
    columns: Vec<Vec<BarColumn>>,
    next_column: u32,
    next_filament: u32,
}

impl<'a, P: PixelSource + ?Sized> BarsRetriever<'a, P> {
    pub fn new(
        source: &'a P,
        lags: &'a Lags,
        staves: StaffManager,
        skew: Skew,
        scale: Scale,
        settings: BarsSettings,
    ) -> Self {
        Self {
            source,
            lags,
            scale,
            skew,
            settings,
            graph_params: PeakGraphParams::new(&settings.peak_graph, &scale),
            params: BarsParams::new(&settings.bars, &scale),
            staves,
            projectors: Vec::new(),
            graph: PeakGraph::new(),
            systems: Vec::new(),
            system_of: Vec::new(),
            columns: Vec::new(),
            next_column: 1,
            next_filament: 0,
        }
    }

    /// First id given to bar filaments, to keep them apart from the
    /// staff-line filaments of the sheet.
    pub fn with_filament_base(mut self, base: u32) -> Self {
        self.next_filament = base;
        self
    }

    /// Run every phase, in order.
    ///
    /// Fails only when no system can be built from the staves.
    pub fn process(mut self) -> Result<BarsOutcome> {
        let timings = self.run()?;
        info!(
            "bars: {} systems, {} peaks, {} links",
            self.systems.len(),
            self.graph.peak_count(),
            self.graph.edge_count()
        );
        Ok(BarsOutcome {
            staff_peaks: self.projectors.iter().map(|p| p.peaks().to_vec()).collect(),
            brace_peaks: self.projectors.iter().map(StaffProjector::brace_peak).collect(),
            staves: self.staves,
            systems: self.systems,
            graph: self.graph,
            columns: self.columns,
            timings,
        })
    }

    fn run(&mut self) -> Result<TimingBreakdown> {
        let mut watch = StopWatch::new("bars");

        watch.start("find_bar_peaks");
        self.find_bar_peaks();
        watch.start("build_bar_sticks");
        self.build_bar_sticks();
        watch.start("detect_curved_peaks");
        self.detect_curved_peaks();
        watch.start("find_all_alignments");
        self.find_all_alignments();
        watch.start("find_connections");
        self.find_connections();
        watch.start("split_merged_groups");
        self.split_merged_groups();
        watch.start("purge_alignments");
        self.purge_alignments();
        watch.start("create_systems");
        let tops = self.system_tops();
        self.create_systems(&tops);
        if self.systems.is_empty() {
            return Err(GridError::NoSystems {
                staves: self.staves.len(),
            });
        }
        watch.start("purge_cross_alignments");
        self.purge_cross_alignments();

        watch.start("build_columns");
        self.build_columns();
        watch.start("detect_start_columns");
        self.detect_start_columns();
        watch.start("purge_partial_columns");
        self.purge_partial_columns();
        watch.start("purge_too_left");
        self.purge_too_left();
        watch.start("detect_brace_portions");
        self.detect_brace_portions();
        watch.start("build_braces");
        self.build_braces();
        watch.start("purge_left_of_braces");
        self.purge_left_of_braces();
        watch.start("verify_lines_root");
        self.verify_lines_root();
        watch.start("detect_bracket_ends");
        self.detect_bracket_ends();
        watch.start("detect_bracket_middles");
        self.detect_bracket_middles();
        watch.start("purge_left_peaks");
        self.purge_left_peaks();
        watch.start("purge_unaligned_bars");
        self.purge_unaligned_bars();
        watch.start("purge_extending_peaks");
        self.purge_extending_peaks();
        watch.start("refine_right_ends");
        self.refine_right_ends();
        watch.start("purge_c_clefs");
        self.purge_c_clefs();
        watch.start("partition_widths");
        self.partition_widths();

        watch.start("create_inters");
        self.create_inters();
        watch.start("create_connection_inters");
        self.create_connection_inters();
        watch.start("group_barlines");
        self.group_barlines();
        watch.start("record_bars");
        self.record_bars();
        watch.start("create_groups");
        self.create_groups();
        watch.start("create_parts");
        self.create_parts();
        watch.start("contextualize");
        self.contextualize();
        Ok(watch.finish())
    }

    fn next_filament_id(&mut self) -> FilamentId {
        let id = FilamentId(self.next_filament);
        self.next_filament += 1;
        id
    }

    /// Vertical filament of the peak rectangle, grown vertically by
    /// `extension` pixels.
    fn build_stick(&mut self, builder: &BarFilamentBuilder<'_>, peak: PeakId, extension: i32) -> Option<Filament> {
        let core = self.graph.peak(peak).bounds();
        let lookup = core.grow(0, extension);
        let id = self.next_filament_id();
        builder.build(id, &core, &lookup)
    }

    /// Half of the maximum staff line thickness.
    fn half_line(&self) -> f64 {
        self.scale.max_line_thickness as f64 / 2.0
    }

    /// Remove peaks from their staff and the graph, clearing the column
    /// slots they occupied.
    fn remove_peaks(&mut self, staff: usize, peaks: &[PeakId]) {
        for &peak in peaks {
            if let Some(column) = self.graph.peak(peak).column {
                if let Some(col) = self.column_mut(column) {
                    col.clear(peak);
                }
            }
            self.projectors[staff].remove_peak(&mut self.graph, peak);
        }
    }

    /// Delete the columns that held any of the removed peaks, with all
    /// their remaining peaks.
    fn delete_related_columns(&mut self, removed: &[PeakId]) {
        let mut doomed: Vec<u32> = removed.iter().filter_map(|&p| self.graph.peak(p).column).collect();
        doomed.sort_unstable();
        doomed.dedup();
        for column in doomed {
            let Some((system, index)) = self.locate_column(column) else {
                continue;
            };
            let col = self.columns[system].remove(index);
            debug!("bars: deleting column#{} of system#{}", column, system + 1);
            for peak in col.peaks() {
                if self.graph.contains(peak) {
                    let staff = self.graph.peak(peak).staff;
                    self.projectors[staff].remove_peak(&mut self.graph, peak);
                }
            }
        }
    }

    fn locate_column(&self, column: u32) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(s, cols)| {
            cols.iter().position(|c| c.id == column).map(|i| (s, i))
        })
    }

    fn column_mut(&mut self, column: u32) -> Option<&mut BarColumn> {
        let (system, index) = self.locate_column(column)?;
        Some(&mut self.columns[system][index])
    }

    /// Substitute `new_peak` for `old` in the staff, its column and its
    /// links; `old` is then removed.
    fn replace_peak(&mut self, old: PeakId, new_peak: Peak) -> PeakId {
        let staff = self.graph.peak(old).staff;
        let column = self.graph.peak(old).column;
        let new = self.projectors[staff].insert_peak(&mut self.graph, new_peak, old);

        if let Some(column) = column {
            let system = self.system_of[staff];
            let position = self.systems[system].position_of(staff);
            if let (Some(col), Some(position)) = (self.column_mut(column), position) {
                col.set(position, Some(new));
                self.graph.peak_mut(new).column = Some(column);
            }
        }

        let copied: Vec<BarAlignment> = self
            .graph
            .edges()
            .filter(|e| e.top == old || e.bottom == old)
            .cloned()
            .collect();
        for mut edge in copied {
            if edge.top == old {
                edge.top = new;
            } else {
                edge.bottom = new;
            }
            self.graph.add_edge(edge);
        }

        self.graph.peak_mut(old).column = None;
        self.projectors[staff].remove_peak(&mut self.graph, old);
        new
    }

    /// Staves of multi-staff systems, per system, top down.
    fn multi_staff_systems(&self) -> Vec<Vec<usize>> {
        self.systems
            .iter()
            .filter(|s| s.is_multi_staff())
            .map(|s| s.staves.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests;
