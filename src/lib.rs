#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod scale;
pub mod sheet;
pub mod switches;
pub mod system;
pub mod types;

// Stage modules – public for tools and tests, considered unstable internals.
pub mod bars;
pub mod filament;
pub mod grade;
pub mod lines;
pub mod sections;
pub mod sig;
pub mod skew;
pub mod staff;

// --- High-level re-exports -------------------------------------------------

// Main entry points: builder + results.
pub use crate::error::{GridError, Result};
pub use crate::scale::Scale;
pub use crate::sheet::{GridBuilder, GridParams, SheetGrid};
pub use crate::switches::ProcessingSwitches;

// Report written by the demo.
pub use crate::diagnostics::{GridReport, TimingBreakdown};

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use staff_grid::prelude::*;
///
/// # fn main() -> staff_grid::Result<()> {
/// let (w, h) = (1200usize, 1600usize);
/// let image = BinaryImage::new(w, h);
/// let grid = GridBuilder::new(GridParams::default()).process(&image, Scale::new(20, 2.0))?;
/// println!("systems={} staves={}", grid.systems.len(), grid.staves.len());
/// # Ok(())
/// # }
/// ```
pub mod prelude {
    pub use crate::image::BinaryImage;
    pub use crate::system::{GroupSymbol, Part, PartGroup, SystemInfo};
    pub use crate::{GridBuilder, GridError, GridParams, ProcessingSwitches, Scale, SheetGrid};
}
