use super::peak::PeakId;
use crate::grade::GradeImpacts;
use crate::types::VerticalSide;
use serde::Serialize;
use std::cmp::Ordering;

pub const ALIGNMENT_IMPACT_NAMES: &[&str] = &["align", "dWidth"];
pub const ALIGNMENT_IMPACT_WEIGHTS: &[f64] = &[1.0, 1.0];
pub const CONNECTION_IMPACT_NAMES: &[&str] = &["align", "dWidth", "gap", "white"];
pub const CONNECTION_IMPACT_WEIGHTS: &[f64] = &[1.0, 1.0, 1.0, 1.0];

/// Nature of the link between two vertically adjacent peaks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LinkKind {
    /// Abscissa-consistent peaks.
    Alignment,
    /// Peaks joined by a concrete vertical stroke across the gutter.
    Connection {
        /// Longest vertical background gap within the stroke.
        gap: i32,
        white_ratio: f64,
        impacts: GradeImpacts,
    },
}

/// Edge of the peak graph, from a peak in one staff to a peak in the staff
/// below.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarAlignment {
    pub top: PeakId,
    pub bottom: PeakId,
    /// Difference between the link slope and the sheet vertical.
    pub slope: f64,
    /// Width of bottom peak minus width of top peak.
    pub d_width: i32,
    pub impacts: GradeImpacts,
    pub kind: LinkKind,
}

impl BarAlignment {
    pub fn new(top: PeakId, bottom: PeakId, slope: f64, d_width: i32, impacts: GradeImpacts) -> Self {
        Self {
            top,
            bottom,
            slope,
            d_width,
            impacts,
            kind: LinkKind::Alignment,
        }
    }

    pub fn peak(&self, side: VerticalSide) -> PeakId {
        match side {
            VerticalSide::Top => self.top,
            VerticalSide::Bottom => self.bottom,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self.kind, LinkKind::Connection { .. })
    }

    /// Promote to a connection with the measured stroke data.
    pub fn into_connection(self, gap: i32, white_ratio: f64, gap_impact: f64, white_impact: f64) -> Self {
        let values = vec![self.impacts.value(0), self.impacts.value(1), gap_impact, white_impact];
        let impacts = GradeImpacts::new(CONNECTION_IMPACT_NAMES, CONNECTION_IMPACT_WEIGHTS, values);
        Self {
            kind: LinkKind::Connection {
                gap,
                white_ratio,
                impacts,
            },
            ..self
        }
    }

    /// Impacts of the connection if any, of the alignment otherwise.
    pub fn link_impacts(&self) -> &GradeImpacts {
        match &self.kind {
            LinkKind::Connection { impacts, .. } => impacts,
            LinkKind::Alignment => &self.impacts,
        }
    }

    pub fn grade(&self) -> f64 {
        self.impacts.grade()
    }
}

/// Best of competing links: connections first, then highest alignment grade.
///
/// `side` is the side of the shared peak, only used to break exact ties on
/// the abscissa of the other peak (the one with lower id wins).
pub fn best_of<'a>(links: &[&'a BarAlignment], side: VerticalSide) -> Option<&'a BarAlignment> {
    links.iter().copied().max_by(|a, b| {
        a.is_connection()
            .cmp(&b.is_connection())
            .then_with(|| a.grade().partial_cmp(&b.grade()).unwrap_or(Ordering::Equal))
            .then_with(|| {
                let other = side.opposite();
                b.peak(other).cmp(&a.peak(other))
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(top: u32, bottom: u32, align: f64) -> BarAlignment {
        let impacts = GradeImpacts::new(ALIGNMENT_IMPACT_NAMES, ALIGNMENT_IMPACT_WEIGHTS, vec![align, 1.0]);
        BarAlignment::new(PeakId(top), PeakId(bottom), 0.0, 0, impacts)
    }

    #[test]
    fn connections_beat_better_alignments() {
        let a = link(1, 10, 0.9);
        let b = link(1, 11, 0.5).into_connection(0, 0.0, 1.0, 1.0);
        let c = link(1, 12, 0.7);
        let best = best_of(&[&a, &b, &c], VerticalSide::Top).map(|l| l.bottom);
        assert_eq!(best, Some(PeakId(11)));
        let best = best_of(&[&a, &c], VerticalSide::Top).map(|l| l.bottom);
        assert_eq!(best, Some(PeakId(10)));
        assert!(best_of(&[], VerticalSide::Bottom).is_none());
    }

    #[test]
    fn ties_favor_lower_partner_id() {
        let a = link(1, 12, 0.8);
        let b = link(1, 10, 0.8);
        let best = best_of(&[&a, &b], VerticalSide::Top).map(|l| l.bottom);
        assert_eq!(best, Some(PeakId(10)));
    }
}
