//! Sections: maximal stacks of overlapping runs.
//!
//! A *run* is a sequence of consecutive foreground pixels along one
//! orientation. A *section* aggregates runs on consecutive rows (or columns)
//! when their junction is unambiguous. Two collections are built per sheet:
//!
//! - vertical sections, from vertical runs longer than the maximum staff line
//!   thickness (barlines, stems, bracket and brace strokes);
//! - horizontal sections, from the remaining horizontal runs (staff lines,
//!   ledgers, beams).
//!
//! Sections are the raw material of filaments.

mod lag;
mod options;
mod section;

pub(crate) use lag::build_lags;
pub use lag::Lags;
pub(crate) use options::LagParams;
pub use options::LagOptions;
pub use section::{Run, Section, SectionId};

#[cfg(test)]
mod tests;
