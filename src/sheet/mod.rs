//! Sheet-level orchestration of the grid stage.
//!
//! Modules
//! - [`params`]: the [`GridParams`] aggregate of every stage options.
//! - `builder`: the [`GridBuilder`] pipeline and its [`SheetGrid`] result.

mod builder;
pub mod params;

pub use builder::{GridBuilder, SheetGrid};
pub use params::GridParams;
