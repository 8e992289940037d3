use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Wall-clock duration of one phase of the grid stage.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl PhaseTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated phase timings of one sheet.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub phases: Vec<PhaseTiming>,
}

impl TimingBreakdown {
    pub fn with_total(total_ms: f64) -> Self {
        Self {
            total_ms,
            phases: Vec::new(),
        }
    }

    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.phases.push(PhaseTiming::new(label, elapsed_ms));
    }

    /// Append the phases of `other`, prefixing their labels.
    pub fn extend_prefixed(&mut self, prefix: &str, other: &TimingBreakdown) {
        for phase in &other.phases {
            self.push(format!("{prefix}.{}", phase.label), phase.elapsed_ms);
        }
    }

    pub fn phase(&self, label: &str) -> Option<&PhaseTiming> {
        self.phases.iter().find(|p| p.label == label)
    }
}

/// Records consecutive phases: starting a phase closes the current one.
#[derive(Debug)]
pub struct StopWatch {
    name: &'static str,
    origin: Instant,
    current: Option<(&'static str, Instant)>,
    timings: TimingBreakdown,
}

impl StopWatch {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            origin: Instant::now(),
            current: None,
            timings: TimingBreakdown::default(),
        }
    }

    pub fn start(&mut self, label: &'static str) {
        self.close();
        self.current = Some((label, Instant::now()));
    }

    fn close(&mut self) {
        if let Some((label, since)) = self.current.take() {
            self.timings.push(label, since.elapsed().as_secs_f64() * 1000.0);
        }
    }

    /// Close the running phase and return the breakdown.
    pub fn finish(mut self) -> TimingBreakdown {
        self.close();
        self.timings.total_ms = self.origin.elapsed().as_secs_f64() * 1000.0;
        log::debug!("{}: {:.3} ms over {} phases", self.name, self.timings.total_ms, self.timings.phases.len());
        self.timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_records_phases_in_order() {
        let mut watch = StopWatch::new("test");
        watch.start("first");
        watch.start("second");
        let timings = watch.finish();
        let labels: Vec<&str> = timings.phases.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
        assert!(timings.total_ms >= timings.phases.iter().map(|p| p.elapsed_ms).sum::<f64>() - 1e-9);
        assert!(timings.phase("second").is_some());
    }

    #[test]
    fn prefixed_extension() {
        let mut outer = TimingBreakdown::default();
        let mut inner = TimingBreakdown::default();
        inner.push("projectors", 1.5);
        outer.extend_prefixed("bars", &inner);
        assert_eq!(outer.phases[0].label, "bars.projectors");
    }
}
