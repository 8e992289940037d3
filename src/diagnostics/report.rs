use super::TimingBreakdown;
use crate::sheet::SheetGrid;
use crate::sig::InterKind;
use crate::system::{Part, PartGroup};
use serde::Serialize;

/// Serializable summary of a [`SheetGrid`], as written by the demo.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridReport {
    pub input: InputDescriptor,
    pub skew_slope: f64,
    pub filament_count: usize,
    pub discarded_filaments: usize,
    pub peak_count: usize,
    pub staves: Vec<StaffReport>,
    pub systems: Vec<SystemReport>,
    pub timings: TimingBreakdown,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
    pub interline: i32,
    pub line_thickness: f64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffReport {
    pub id: u32,
    pub left: f64,
    pub right: f64,
    pub line_count: usize,
    pub interline: i32,
    pub small: bool,
    pub short: bool,
    /// Abscissae of the retained peaks, left to right.
    pub peaks: Vec<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brace: Option<i32>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReport {
    pub id: u32,
    /// Staff ids, top down.
    pub staves: Vec<u32>,
    pub parts: Vec<Part>,
    pub groups: Vec<PartGroup>,
    pub column_count: usize,
    pub inters: InterCounts,
}

/// Interpretation counts of one system, per shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterCounts {
    pub thin_barlines: usize,
    pub thick_barlines: usize,
    pub connectors: usize,
    pub brackets: usize,
    pub braces: usize,
}

impl InterCounts {
    fn add(&mut self, kind: &InterKind) {
        match kind {
            InterKind::Barline { thick: false } => self.thin_barlines += 1,
            InterKind::Barline { thick: true } => self.thick_barlines += 1,
            InterKind::BarConnector { .. } | InterKind::BracketConnector => self.connectors += 1,
            InterKind::Bracket { .. } => self.brackets += 1,
            InterKind::Brace => self.braces += 1,
        }
    }
}

impl GridReport {
    pub fn from_grid(grid: &SheetGrid) -> Self {
        let staves = grid
            .staves
            .staves()
            .iter()
            .enumerate()
            .map(|(index, staff)| StaffReport {
                id: staff.id.0,
                left: staff.left(),
                right: staff.right(),
                line_count: staff.line_count(),
                interline: staff.interline(),
                small: staff.is_small(),
                short: staff.is_short(),
                peaks: grid
                    .staff_peaks
                    .get(index)
                    .into_iter()
                    .flatten()
                    .map(|&p| grid.graph.peak(p).mid())
                    .collect(),
                brace: grid
                    .brace_peaks
                    .get(index)
                    .copied()
                    .flatten()
                    .map(|p| grid.graph.peak(p).mid()),
            })
            .collect();

        let systems = grid
            .systems
            .iter()
            .enumerate()
            .map(|(index, system)| {
                let mut inters = InterCounts::default();
                for inter in system.sig.inters() {
                    inters.add(&inter.kind);
                }
                SystemReport {
                    id: system.id,
                    staves: system
                        .staves
                        .iter()
                        .map(|&s| grid.staves.staves()[s].id.0)
                        .collect(),
                    parts: system.parts.clone(),
                    groups: system.groups.clone(),
                    column_count: grid.columns.get(index).map_or(0, Vec::len),
                    inters,
                }
            })
            .collect();

        Self {
            input: InputDescriptor {
                width: grid.width,
                height: grid.height,
                interline: grid.scale.interline(),
                line_thickness: grid.scale.line_thickness,
            },
            skew_slope: grid.skew.slope(),
            filament_count: grid.filament_count,
            discarded_filaments: grid.discarded_filaments,
            peak_count: grid.graph.peak_count(),
            staves,
            systems,
            timings: grid.timings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inter_counts_follow_shapes() {
        let mut counts = InterCounts::default();
        for kind in [
            InterKind::Barline { thick: false },
            InterKind::Barline { thick: true },
            InterKind::Barline { thick: false },
            InterKind::BarConnector { thick: true },
            InterKind::BracketConnector,
            InterKind::Brace,
        ] {
            counts.add(&kind);
        }
        assert_eq!(
            counts,
            InterCounts {
                thin_barlines: 2,
                thick_barlines: 1,
                connectors: 2,
                brackets: 0,
                braces: 1,
            }
        );
    }
}
