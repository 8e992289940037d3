//! JSON configuration of the demo binary.

pub mod grid;

pub use grid::{load_config, OutputConfig, RuntimeConfig, ScaleConfig};
