//! Symbol interpretation graph of a system.
//!
//! Overview
//! - Vertices are interpretations ([`Inter`]) promoted from retained peaks:
//!   barlines, brackets, braces and the connectors drawn between staves.
//! - Edges are [`Relation`]s: mutual non-exclusion, bar connection (a
//!   support between two barlines joined by a connector) and bar grouping
//!   (members of a double bar).
//! - Contextual grades combine the intrinsic grade with the supports
//!   received; frozen interpretations are certain.

use crate::grade::{self, GradeImpacts};
use crate::types::{HorizontalSide, Rect};
use log::debug;
use nalgebra::Point2;
use serde::Serialize;
use std::fmt;

/// Support ratio of a perfect bar connection.
pub const BAR_CONNECTION_SUPPORT_RATIO: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct InterId(pub u32);

impl InterId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Vertical extent of a bracket portion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketKind {
    /// Top serif only.
    Top,
    /// Bottom serif only.
    Bottom,
    /// Single-staff bracket with both serifs.
    Both,
    /// Middle portion, no serif.
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum InterKind {
    Barline { thick: bool },
    Bracket { kind: BracketKind },
    Brace,
    BarConnector { thick: bool },
    BracketConnector,
}

impl InterKind {
    pub fn is_connector(&self) -> bool {
        matches!(self, InterKind::BarConnector { .. } | InterKind::BracketConnector)
    }
}

impl fmt::Display for InterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterKind::Barline { thick: false } => f.write_str("THIN_BARLINE"),
            InterKind::Barline { thick: true } => f.write_str("THICK_BARLINE"),
            InterKind::Bracket { .. } => f.write_str("BRACKET"),
            InterKind::Brace => f.write_str("BRACE"),
            InterKind::BarConnector { thick: false } => f.write_str("THIN_CONNECTOR"),
            InterKind::BarConnector { thick: true } => f.write_str("THICK_CONNECTOR"),
            InterKind::BracketConnector => f.write_str("BRACKET_CONNECTOR"),
        }
    }
}

/// One interpretation.
#[derive(Clone, Debug, Serialize)]
pub struct Inter {
    pub id: InterId,
    pub kind: InterKind,
    /// Index of the related staff, none for connectors.
    pub staff: Option<usize>,
    pub bounds: Rect,
    /// Top and bottom points of the median line.
    pub median: Option<(Point2<f64>, Point2<f64>)>,
    pub width: f64,
    pub impacts: Option<GradeImpacts>,
    pub grade: f64,
    pub contextual_grade: Option<f64>,
    pub frozen: bool,
    /// Staff side this barline ends, if any.
    pub staff_end: Option<HorizontalSide>,
}

impl Inter {
    pub fn new(kind: InterKind, bounds: Rect, grade: f64) -> Self {
        Self {
            id: InterId(0),
            kind,
            staff: None,
            bounds,
            median: None,
            width: bounds.width as f64,
            impacts: None,
            grade,
            contextual_grade: None,
            frozen: false,
            staff_end: None,
        }
    }

    pub fn with_staff(mut self, staff: usize) -> Self {
        self.staff = Some(staff);
        self
    }

    pub fn with_median(mut self, top: Point2<f64>, bottom: Point2<f64>, width: f64) -> Self {
        self.median = Some((top, bottom));
        self.width = width;
        self
    }

    pub fn with_impacts(mut self, impacts: GradeImpacts) -> Self {
        self.impacts = Some(impacts);
        self
    }

    pub fn is_good(&self) -> bool {
        self.grade >= grade::GOOD_INTER_GRADE
    }

    /// Contextual grade if computed, intrinsic grade otherwise.
    pub fn best_grade(&self) -> f64 {
        self.contextual_grade.unwrap_or(self.grade)
    }

    /// Make the interpretation certain.
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.grade = 1.0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
    /// Source and target may coexist.
    NoExclusion,
    /// Two barlines joined through a connector, `grade` being the connection
    /// grade.
    BarConnection { grade: f64 },
    /// Two barlines of one group, `gap` in interline fraction.
    BarGroup { gap: f64 },
}

impl Relation {
    /// Full support ratio of the relation, none for non-supporting ones.
    pub fn support_ratio(&self) -> Option<f64> {
        match self {
            Relation::BarConnection { grade } => Some(grade::support_ratio(BAR_CONNECTION_SUPPORT_RATIO, *grade)),
            Relation::NoExclusion | Relation::BarGroup { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SigEdge {
    pub source: InterId,
    pub target: InterId,
    pub relation: Relation,
}

/// Interpretation graph of one system.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Sig {
    inters: Vec<Inter>,
    edges: Vec<SigEdge>,
}

impl Sig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, mut inter: Inter) -> InterId {
        let id = InterId(self.inters.len() as u32);
        inter.id = id;
        self.inters.push(inter);
        id
    }

    pub fn add_edge(&mut self, source: InterId, target: InterId, relation: Relation) {
        self.edges.push(SigEdge {
            source,
            target,
            relation,
        });
    }

    pub fn inter(&self, id: InterId) -> &Inter {
        &self.inters[id.index()]
    }

    pub fn inter_mut(&mut self, id: InterId) -> &mut Inter {
        &mut self.inters[id.index()]
    }

    pub fn inters(&self) -> &[Inter] {
        &self.inters
    }

    pub fn edges(&self) -> &[SigEdge] {
        &self.edges
    }

    pub fn inters_of<'a>(
        &'a self,
        kind: impl Fn(&InterKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Inter> + 'a {
        self.inters.iter().filter(move |i| kind(&i.kind))
    }

    /// Relations touching `id`, in insertion order.
    pub fn relations_of(&self, id: InterId) -> impl Iterator<Item = &SigEdge> + '_ {
        self.edges.iter().filter(move |e| e.source == id || e.target == id)
    }

    pub fn has_relation(&self, a: InterId, b: InterId, matches: impl Fn(&Relation) -> bool) -> bool {
        self.edges.iter().any(|e| {
            ((e.source == a && e.target == b) || (e.source == b && e.target == a)) && matches(&e.relation)
        })
    }

    pub fn freeze(&mut self, id: InterId) {
        self.inters[id.index()].freeze();
    }

    /// Compute the contextual grade of every interpretation.
    ///
    /// A supporting relation brings a ratio scaled by the partner grade;
    /// ratios of several supports multiply.
    pub fn contextualize(&mut self) {
        let grades: Vec<f64> = self.inters.iter().map(|i| i.grade).collect();
        let mut ratios = vec![1.0; self.inters.len()];
        for edge in &self.edges {
            let Some(full) = edge.relation.support_ratio() else {
                continue;
            };
            let (s, t) = (edge.source.index(), edge.target.index());
            ratios[s] *= grade::support_ratio(full, grades[t]);
            ratios[t] *= grade::support_ratio(full, grades[s]);
        }
        for (inter, ratio) in self.inters.iter_mut().zip(ratios) {
            inter.contextual_grade = Some(if inter.frozen {
                1.0
            } else {
                grade::contextual(inter.grade, ratio)
            });
        }
        debug!("sig: contextualized {} inters", self.inters.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn barline(sig: &mut Sig, x: i32, grade: f64) -> InterId {
        sig.add_vertex(Inter::new(InterKind::Barline { thick: false }, Rect::new(x, 0, 3, 80), grade))
    }

    #[test]
    fn supports_raise_contextual_grades() {
        let mut sig = Sig::new();
        let a = barline(&mut sig, 100, 0.5);
        let b = barline(&mut sig, 100, 0.6);
        let lone = barline(&mut sig, 300, 0.5);
        sig.add_edge(a, b, Relation::BarConnection { grade: 0.8 });
        sig.add_edge(a, lone, Relation::BarGroup { gap: 0.4 });
        sig.contextualize();

        let ca = sig.inter(a).contextual_grade.unwrap_or_default();
        assert!(ca > 0.5 && ca < 1.0);
        assert_eq!(sig.inter(lone).contextual_grade, Some(0.5));
        assert!(sig.has_relation(b, a, |r| matches!(r, Relation::BarConnection { .. })));
        assert_eq!(sig.relations_of(a).count(), 2);
    }

    #[test]
    fn inters_filtered_by_kind() {
        let mut sig = Sig::new();
        barline(&mut sig, 10, 0.5);
        sig.add_vertex(Inter::new(InterKind::Brace, Rect::new(0, 0, 8, 200), 0.6));
        barline(&mut sig, 40, 0.5);
        let thin = |k: &InterKind| matches!(k, InterKind::Barline { thick: false });
        let xs: Vec<i32> = sig.inters_of(thin).map(|i| i.bounds.x).collect();
        assert_eq!(xs, vec![10, 40]);
        assert_eq!(sig.inters_of(|k| matches!(k, InterKind::Brace)).count(), 1);
    }

    #[test]
    fn frozen_inters_are_certain() {
        let mut sig = Sig::new();
        let a = barline(&mut sig, 10, 0.2);
        assert!(!sig.inter(a).is_good());
        sig.freeze(a);
        sig.contextualize();
        assert!(sig.inter(a).is_good());
        assert_eq!(sig.inter(a).best_grade(), 1.0);
    }
}
