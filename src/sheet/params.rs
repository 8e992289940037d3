//! Parameters of the whole grid stage.
//!
//! Every stage keeps its own options struct; [`GridParams`] only aggregates
//! them so that one JSON document configures a run.

use crate::bars::{BarsOptions, BarsSettings, PeakGraphOptions, ProjectorOptions};
use crate::filament::FilamentOptions;
use crate::lines::{ClusterOptions, LinesOptions};
use crate::sections::LagOptions;
use crate::switches::ProcessingSwitches;
use serde::{Deserialize, Serialize};

/// Options of every phase, in processing order.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Run and section extraction.
    pub lags: LagOptions,
    /// Staff-line filaments.
    pub filaments: FilamentOptions,
    /// Slope and curvature purges around the clustering.
    pub lines: LinesOptions,
    /// Comb-based clustering of line filaments.
    pub clusters: ClusterOptions,
    pub projector: ProjectorOptions,
    pub peak_graph: PeakGraphOptions,
    pub bars: BarsOptions,
    pub switches: ProcessingSwitches,
}

impl GridParams {
    /// Options read by the bars retriever.
    pub fn bars_settings(&self) -> BarsSettings {
        BarsSettings {
            projector: self.projector,
            peak_graph: self.peak_graph,
            bars: self.bars,
            switches: self.switches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: GridParams = serde_json::from_str(
            r#"{"switches": {"force_single_part": true}, "bars": {"min_measure_width": 3.0}}"#,
        )
        .unwrap();
        assert!(params.switches.force_single_part);
        assert_eq!(params.bars.min_measure_width, 3.0);
        assert_eq!(params.bars.max_double_bar_gap, BarsOptions::default().max_double_bar_gap);
        let settings = params.bars_settings();
        assert!(settings.switches.force_single_part);
        assert_eq!(settings.bars.min_measure_width, 3.0);
    }
}
