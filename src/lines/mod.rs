//! Staff-line retrieval.
//!
//! Overview
//! - Filaments that are curved or sloped against the sheet are purged first;
//!   the global sheet slope comes from the longest filaments.
//! - [`clusters`] gathers the remaining filaments into staff candidates:
//!   sampled [`comb::Comb`]s seed [`cluster::LineCluster`]s which are then
//!   expanded, merged, trimmed and filtered.
//! - Sheets with a second, smaller interline run a second clustering pass on
//!   the filaments left over by the first one.
//! - Clusters finally become [`Staff`] instances, in layout order.
//!
//! Too few filaments after the purges is the one condition reported as an
//! error: the sheet does not contain staff lines.

pub mod cluster;
pub mod clusters;
pub mod comb;
mod options;

pub use cluster::{ClusterId, LineCluster};
pub use clusters::ClustersOutcome;
pub use comb::{Comb, CombId};
pub use options::{ClusterOptions, LinesOptions};

use self::clusters::ClustersRetriever;
use self::options::ClusterParams;
use crate::error::{GridError, Result};
use crate::filament::{FilamentArena, FilamentId};
use crate::scale::{InterlineScale, Scale};
use crate::skew::Skew;
use crate::staff::{Staff, StaffId, StaffLine, StaffManager};
use crate::switches::ProcessingSwitches;
use crate::types::HorizontalSide;
use log::{debug, info};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Staves and skew retrieved from a set of horizontal filaments.
#[derive(Clone, Debug)]
pub struct LinesOutcome {
    pub staves: StaffManager,
    pub skew: Skew,
    /// Filaments used by no staff.
    pub discarded: Vec<FilamentId>,
    pub curved_count: usize,
    pub sloped_count: usize,
    pub comb_count: usize,
}

#[derive(Clone, Copy, Debug)]
struct LinesParams {
    max_filament_rotation: f64,
    top_ratio_for_slope: f64,
    max_slope_diff: f64,
    min_slope: f64,
    min_length_for_slope_check: i32,
    min_filament_count: usize,
}

impl LinesParams {
    fn new(options: &LinesOptions, scale: &Scale) -> Self {
        Self {
            max_filament_rotation: options.max_filament_rotation,
            top_ratio_for_slope: options.top_ratio_for_slope,
            max_slope_diff: options.max_slope_diff,
            min_slope: options.min_slope,
            min_length_for_slope_check: scale.to_pixels(options.min_length_for_slope_check),
            min_filament_count: options.min_filament_count,
        }
    }
}

/// Turns long horizontal filaments into staves.
#[derive(Clone, Debug)]
pub struct LinesRetriever {
    params: LinesParams,
    cluster_options: ClusterOptions,
    switches: ProcessingSwitches,
    scale: Scale,
    sheet_width: i32,
}

impl LinesRetriever {
    pub fn new(
        options: &LinesOptions,
        cluster_options: &ClusterOptions,
        switches: &ProcessingSwitches,
        scale: Scale,
        sheet_width: i32,
    ) -> Self {
        Self {
            params: LinesParams::new(options, &scale),
            cluster_options: *cluster_options,
            switches: *switches,
            scale,
            sheet_width,
        }
    }

    pub fn retrieve(
        &self,
        arena: &mut FilamentArena,
        mut filaments: Vec<FilamentId>,
    ) -> Result<LinesOutcome> {
        let curved_count = self.purge_curved(arena, &mut filaments);
        self.check_count(&filaments)?;
        let slope = self.global_slope(arena, &mut filaments);
        let skew = Skew::from_slope(slope);
        info!("lines: global slope {:.5}", slope);
        let sloped_count = self.purge_sloped(arena, &mut filaments, slope);
        self.check_count(&filaments)?;

        let main = self.scale.interline;
        let first = ClustersRetriever::new(
            arena,
            filaments,
            skew,
            ClusterParams::new(&self.cluster_options, &self.scale, &main),
            main,
            self.sheet_width,
            self.scale.max_line_thickness,
            self.switches.comb_sizes(),
            self.scale.is_multi_interline(),
        )
        .retrieve();
        let mut comb_count = first.comb_count;
        let mut discarded = first.discarded;
        let mut found: Vec<FoundCluster> = first
            .clusters
            .into_iter()
            .map(|cluster| FoundCluster::new(cluster, main.main, false))
            .collect();

        if let Some(small) = self.scale.small_interline {
            if !discarded.is_empty() {
                info!("lines: searching clusters with small interline {}", small.main);
                let mut second_filaments = std::mem::take(&mut discarded);
                second_filaments.sort_unstable();
                let second = self.small_pass(arena, second_filaments, skew, small);
                comb_count += second.comb_count;
                discarded = second.discarded;
                found.extend(
                    second
                        .clusters
                        .into_iter()
                        .map(|cluster| FoundCluster::new(cluster, small.main, true)),
                );
            }
        }

        let staves = self.build_staves(arena, found, &skew);
        info!(
            "lines: {} staves, {} discarded filaments",
            staves.len(),
            discarded.len()
        );
        Ok(LinesOutcome {
            staves,
            skew,
            discarded,
            curved_count,
            sloped_count,
            comb_count,
        })
    }

    fn small_pass(
        &self,
        arena: &mut FilamentArena,
        filaments: Vec<FilamentId>,
        skew: Skew,
        small: InterlineScale,
    ) -> ClustersOutcome {
        ClustersRetriever::new(
            arena,
            filaments,
            skew,
            ClusterParams::new(&self.cluster_options, &self.scale, &small),
            small,
            self.sheet_width,
            self.scale.max_line_thickness,
            BTreeSet::from([5]),
            false,
        )
        .retrieve()
    }

    /// Remove filaments whose halves are not aligned.
    fn purge_curved(&self, arena: &FilamentArena, filaments: &mut Vec<FilamentId>) -> usize {
        let before = filaments.len();
        filaments.retain(|&f| arena.get(f).rotation() <= self.params.max_filament_rotation);
        let removed = before - filaments.len();
        if removed > 0 {
            debug!("lines: discarded {} curved filaments", removed);
        }
        removed
    }

    fn check_count(&self, filaments: &[FilamentId]) -> Result<()> {
        if filaments.len() < self.params.min_filament_count {
            return Err(GridError::NoStaffLines {
                kept: filaments.len(),
                min: self.params.min_filament_count,
            });
        }
        Ok(())
    }

    /// Mean slope of the longest filaments, zero when negligible.
    fn global_slope(&self, arena: &FilamentArena, filaments: &mut [FilamentId]) -> f64 {
        if filaments.is_empty() {
            return 0.0;
        }
        filaments.sort_by(|a, b| arena.get(*b).length().cmp(&arena.get(*a).length()));
        let top = ((filaments.len() as f64 * self.params.top_ratio_for_slope).round() as usize)
            .clamp(1, filaments.len());
        let mean = filaments[..top]
            .iter()
            .map(|&f| arena.get(f).slope())
            .sum::<f64>()
            / top as f64;
        if mean.abs() >= self.params.min_slope {
            mean
        } else {
            0.0
        }
    }

    /// Remove filaments whose slope departs from the sheet slope.
    ///
    /// Short filaments are tolerated within a window between the sheet slope
    /// and half the maximum difference on the horizontal side.
    fn purge_sloped(&self, arena: &FilamentArena, filaments: &mut Vec<FilamentId>, sheet_slope: f64) -> usize {
        let p = &self.params;
        let (min_short, max_short) = if sheet_slope > 0.0 {
            (-p.max_slope_diff / 2.0, sheet_slope)
        } else {
            (sheet_slope, p.max_slope_diff / 2.0)
        };
        let before = filaments.len();
        filaments.retain(|&f| {
            let fil = arena.get(f);
            let slope = fil.slope();
            if (sheet_slope - slope).abs() <= p.max_slope_diff {
                return true;
            }
            fil.length() < p.min_length_for_slope_check && slope >= min_short && slope <= max_short
        });
        let removed = before - filaments.len();
        if removed > 0 {
            debug!("lines: discarded {} sloped filaments", removed);
        }
        removed
    }

    fn build_staves(
        &self,
        arena: &FilamentArena,
        clusters: Vec<FoundCluster>,
        skew: &Skew,
    ) -> StaffManager {
        let ordered = layout_order(arena, clusters, skew);
        let staves = ordered
            .into_iter()
            .enumerate()
            .map(|(i, found)| {
                let lines: Vec<StaffLine> = found
                    .cluster
                    .lines()
                    .map(|f| StaffLine::from_filament(arena.resolved(f)))
                    .collect();
                let left = lines
                    .iter()
                    .map(|l| l.end_point(HorizontalSide::Left).x)
                    .fold(f64::MAX, f64::min);
                let right = lines
                    .iter()
                    .map(|l| l.end_point(HorizontalSide::Right).x)
                    .fold(f64::MIN, f64::max);
                let interline = found.interline;
                let mut staff = Staff::new(StaffId(i as u32 + 1), left, right, interline, lines);
                if found.small {
                    staff.set_small();
                }
                debug!(
                    "lines: staff #{} lines:{} x:{:.0}..{:.0} interline:{}",
                    staff.id.0,
                    staff.line_count(),
                    left,
                    right,
                    interline
                );
                staff
            })
            .collect();
        let mut manager = StaffManager::new(staves);
        manager.detect_short_staves();
        manager
    }
}

/// A cluster with the interline of the pass that found it.
#[derive(Clone, Debug)]
struct FoundCluster {
    cluster: LineCluster,
    interline: i32,
    small: bool,
}

impl FoundCluster {
    fn new(cluster: LineCluster, interline: i32, small: bool) -> Self {
        Self {
            cluster,
            interline,
            small,
        }
    }
}

/// Order clusters top to bottom, clusters sharing a vertical band (side by
/// side) being ordered left to right.
fn layout_order(arena: &FilamentArena, clusters: Vec<FoundCluster>, skew: &Skew) -> Vec<FoundCluster> {
    let ordinate = |c: &FoundCluster| {
        let center = c.cluster.center(arena);
        skew.deskewed(center.x, center.y).y
    };
    let mut sorted = clusters;
    sorted.sort_by(|a, b| ordinate(a).partial_cmp(&ordinate(b)).unwrap_or(Ordering::Equal));

    let mut rows: Vec<Vec<FoundCluster>> = Vec::new();
    for item in sorted {
        let bounds = item.cluster.bounds(arena);
        let joins_row = rows.last().is_some_and(|row| {
            row.iter()
                .all(|other| other.cluster.bounds(arena).x_overlap(&bounds) < 0)
                && row
                    .iter()
                    .any(|other| other.cluster.bounds(arena).y_overlap(&bounds) > 0)
        });
        match rows.last_mut() {
            Some(row) if joins_row => row.push(item),
            _ => rows.push(vec![item]),
        }
    }
    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by_key(|item| item.cluster.bounds(arena).x);
            row
        })
        .collect()
}

#[cfg(test)]
mod tests;
