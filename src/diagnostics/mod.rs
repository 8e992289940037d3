//! Diagnostics of the grid stage.
//!
//! - `timing`: per-phase wall-clock timings and the [`StopWatch`] recording them.
//! - `report`: the serializable [`GridReport`] summarising a processed sheet.

pub mod report;
pub mod timing;

pub use report::{GridReport, InputDescriptor, InterCounts, StaffReport, SystemReport};
pub use timing::{PhaseTiming, StopWatch, TimingBreakdown};
