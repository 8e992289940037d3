//! Sheet pipeline: lags, line filaments, staves, then bars and groups.
//!
//! Typical usage:
//! ```no_run
//! use staff_grid::{GridBuilder, GridParams, Scale};
//! use staff_grid::image::io::load_binary_image;
//! use std::path::Path;
//!
//! # fn example() -> staff_grid::Result<()> {
//! let image = load_binary_image(Path::new("page.png"), 128)?;
//! let grid = GridBuilder::new(GridParams::default()).process(&image, Scale::new(20, 2.0))?;
//! for system in &grid.systems {
//!     println!("system#{} staves:{:?}", system.id, system.staves);
//! }
//! # Ok(())
//! # }
//! ```

use super::params::GridParams;
use crate::bars::{BarColumn, BarsRetriever, PeakGraph, PeakId};
use crate::diagnostics::{StopWatch, TimingBreakdown};
use crate::error::{GridError, Result};
use crate::filament::{FilamentArena, FilamentFactory, FilamentParams};
use crate::image::BinaryImage;
use crate::lines::LinesRetriever;
use crate::scale::Scale;
use crate::sections::{build_lags, LagParams};
use crate::skew::Skew;
use crate::staff::StaffManager;
use crate::system::SystemInfo;
use log::{debug, info, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Grid of one sheet: staves, systems with their parts and groups, and the
/// barline peaks they were derived from.
#[derive(Clone, Debug)]
pub struct SheetGrid {
    pub width: usize,
    pub height: usize,
    pub scale: Scale,
    pub skew: Skew,
    pub staves: StaffManager,
    /// Systems top down; each one owns its interpretation graph.
    pub systems: Vec<SystemInfo>,
    pub graph: PeakGraph,
    /// Retained peaks, per staff, left to right.
    pub staff_peaks: Vec<Vec<PeakId>>,
    pub brace_peaks: Vec<Option<PeakId>>,
    pub columns: Vec<Vec<BarColumn>>,
    /// Horizontal filaments built from the sheet sections.
    pub filament_count: usize,
    /// Filaments left out of every staff.
    pub discarded_filaments: usize,
    pub timings: TimingBreakdown,
}

impl SheetGrid {
    /// Index of the system holding `staff`.
    pub fn system_of(&self, staff: usize) -> Option<usize> {
        self.systems.iter().position(|s| s.contains(staff))
    }
}

/// Runs the grid stage on binary sheets.
#[derive(Clone, Debug, Default)]
pub struct GridBuilder {
    params: GridParams,
}

impl GridBuilder {
    pub fn new(params: GridParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &GridParams {
        &self.params
    }

    /// Process one sheet.
    ///
    /// Fails when the image or the scale is unusable, when the sheet holds no
    /// staff lines, or when no system can be built.
    pub fn process(&self, image: &BinaryImage, scale: Scale) -> Result<SheetGrid> {
        if image.is_empty() {
            return Err(GridError::EmptyImage {
                width: image.width(),
                height: image.height(),
            });
        }
        scale.validate()?;
        debug!(
            "grid: processing {}x{} interline:{} line:{:.1}",
            image.width(),
            image.height(),
            scale.interline(),
            scale.line_thickness
        );
        let mut watch = StopWatch::new("grid");

        watch.start("lags");
        let lags = build_lags(image, &LagParams::new(&self.params.lags, &scale));

        watch.start("filaments");
        let mut arena = FilamentArena::new();
        let factory = FilamentFactory::new(FilamentParams::new(&self.params.filaments, &scale));
        let filaments = factory.build(&mut arena, &lags.horizontal);
        let filament_count = filaments.len();

        watch.start("lines");
        let lines = LinesRetriever::new(
            &self.params.lines,
            &self.params.clusters,
            &self.params.switches,
            scale,
            image.width() as i32,
        )
        .retrieve(&mut arena, filaments)?;

        watch.start("bars");
        let bars = BarsRetriever::new(
            image,
            &lags,
            lines.staves,
            lines.skew,
            scale,
            self.params.bars_settings(),
        )
        .with_filament_base(arena.len() as u32)
        .process()?;

        let mut timings = watch.finish();
        timings.extend_prefixed("bars", &bars.timings);
        info!(
            "grid: {} staves, {} systems in {:.1} ms",
            bars.staves.len(),
            bars.systems.len(),
            timings.total_ms
        );
        Ok(SheetGrid {
            width: image.width(),
            height: image.height(),
            scale,
            skew: lines.skew,
            staves: bars.staves,
            systems: bars.systems,
            graph: bars.graph,
            staff_peaks: bars.staff_peaks,
            brace_peaks: bars.brace_peaks,
            columns: bars.columns,
            filament_count,
            discarded_filaments: lines.discarded.len(),
            timings,
        })
    }

    /// Process independent sheets, in parallel with the `parallel` feature.
    ///
    /// Failed sheets are logged and dropped; survivors keep their index in
    /// `sheets`.
    pub fn process_batch(&self, sheets: &[(BinaryImage, Scale)]) -> Vec<(usize, SheetGrid)> {
        let run = |(index, (image, scale)): (usize, &(BinaryImage, Scale))| match self.process(image, *scale) {
            Ok(grid) => Some((index, grid)),
            Err(err) => {
                if err.is_sheet_removal() {
                    warn!("grid: sheet#{} has no music: {}", index + 1, err);
                } else {
                    warn!("grid: sheet#{} failed: {}", index + 1, err);
                }
                None
            }
        };

        #[cfg(feature = "parallel")]
        {
            sheets.par_iter().enumerate().filter_map(run).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            sheets.iter().enumerate().filter_map(run).collect()
        }
    }
}
