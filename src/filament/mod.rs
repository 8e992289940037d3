//! Filaments: fitted curves built from sections.
//!
//! Overview
//! - A [`Filament`] owns the sections it was built from and exposes a lazily
//!   computed polyline ([`fit::Curve`]) along its main orientation.
//! - Horizontal filaments live in a [`FilamentArena`]. Merging a filament into
//!   another moves its sections to the host and records the host as parent;
//!   parent links form an acyclic disjoint-set resolved with path compression.
//! - [`factory`] assembles staff-line filaments from horizontal sections.
//! - [`bar`] assembles one vertical filament for a barline core rectangle.

pub mod bar;
pub mod factory;
pub mod fit;
mod options;

pub use bar::BarFilamentBuilder;
pub use factory::FilamentFactory;
pub use options::FilamentOptions;
pub(crate) use options::FilamentParams;

use self::fit::{to_point, Curve};
use crate::sections::Section;
use crate::types::{Orientation, Rect};
use nalgebra::Point2;
use serde::Serialize;
use std::cell::OnceCell;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FilamentId(pub u32);

impl FilamentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct Filament {
    pub id: FilamentId,
    orientation: Orientation,
    /// Sampling step of the polyline, in pixels.
    step: i32,
    sections: Vec<Section>,
    parent: Option<FilamentId>,
    curve: OnceCell<Curve>,
    bounds: OnceCell<Rect>,
    true_length: OnceCell<i32>,
}

impl Filament {
    pub fn new(id: FilamentId, orientation: Orientation, step: i32, sections: Vec<Section>) -> Self {
        Self {
            id,
            orientation,
            step: step.max(1),
            sections,
            parent: None,
            curve: OnceCell::new(),
            bounds: OnceCell::new(),
            true_length: OnceCell::new(),
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn is_horizontal(&self) -> bool {
        self.orientation == Orientation::Horizontal
    }

    fn invalidate(&mut self) {
        self.curve = OnceCell::new();
        self.bounds = OnceCell::new();
        self.true_length = OnceCell::new();
    }

    /// Add sections and drop cached geometry.
    pub fn add_sections(&mut self, sections: impl IntoIterator<Item = Section>) {
        self.sections.extend(sections);
        self.invalidate();
    }

    pub fn bounds(&self) -> Rect {
        *self.bounds.get_or_init(|| {
            self.sections
                .iter()
                .fold(Rect::default(), |acc, s| acc.union(&s.bounds()))
        })
    }

    pub fn weight(&self) -> i32 {
        self.sections.iter().map(Section::weight).sum()
    }

    /// Lowest and highest across positions covering `along`, over all sections.
    pub fn span_at(&self, along: i32) -> Option<(i32, i32)> {
        self.sections
            .iter()
            .filter_map(|s| s.span_at(along))
            .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
    }

    fn compute_curve(&self) -> Curve {
        let b = self.bounds();
        let (start, stop) = if self.is_horizontal() {
            (b.x, b.right())
        } else {
            (b.y, b.bottom())
        };
        let mut samples = Vec::new();
        let mut along = start;
        loop {
            if let Some((lo, hi)) = self.span_at(along) {
                samples.push((along as f64, (lo + hi) as f64 / 2.0));
            }
            if along >= stop {
                break;
            }
            along = (along + self.step).min(stop);
        }
        Curve::new(samples)
    }

    pub fn curve(&self) -> &Curve {
        self.curve.get_or_init(|| self.compute_curve())
    }

    /// Across coordinate at `along` (y at x for a horizontal filament).
    pub fn position_at(&self, along: f64) -> f64 {
        self.curve().across_at(along)
    }

    pub fn y_at(&self, x: f64) -> f64 {
        debug_assert!(self.is_horizontal());
        self.position_at(x)
    }

    pub fn x_at(&self, y: f64) -> f64 {
        debug_assert!(!self.is_horizontal());
        self.position_at(y)
    }

    pub fn start_point(&self) -> Point2<f64> {
        to_point(self.is_horizontal(), self.curve().first().unwrap_or((0.0, 0.0)))
    }

    pub fn stop_point(&self) -> Point2<f64> {
        to_point(self.is_horizontal(), self.curve().last().unwrap_or((0.0, 0.0)))
    }

    /// First covered coordinate along the orientation.
    pub fn start_coord(&self) -> i32 {
        let b = self.bounds();
        if self.is_horizontal() {
            b.x
        } else {
            b.y
        }
    }

    /// Last covered coordinate along the orientation.
    pub fn stop_coord(&self) -> i32 {
        let b = self.bounds();
        if self.is_horizontal() {
            b.right()
        } else {
            b.bottom()
        }
    }

    /// Extent along the orientation.
    pub fn length(&self) -> i32 {
        if self.sections.is_empty() {
            return 0;
        }
        self.stop_coord() - self.start_coord() + 1
    }

    /// Number of coordinates actually covered by sections (holes excluded).
    pub fn true_length(&self) -> i32 {
        *self.true_length.get_or_init(|| {
            let mut extents: Vec<(i32, i32)> = self
                .sections
                .iter()
                .map(|s| {
                    let b = s.bounds();
                    if self.is_horizontal() {
                        (b.x, b.right())
                    } else {
                        (b.y, b.bottom())
                    }
                })
                .collect();
            extents.sort_unstable();
            let mut total = 0;
            let mut current: Option<(i32, i32)> = None;
            for (lo, hi) in extents {
                current = match current {
                    Some((clo, chi)) if lo <= chi + 1 => Some((clo, chi.max(hi))),
                    Some((clo, chi)) => {
                        total += chi - clo + 1;
                        Some((lo, hi))
                    }
                    None => Some((lo, hi)),
                };
            }
            if let Some((lo, hi)) = current {
                total += hi - lo + 1;
            }
            total
        })
    }

    /// Mean thickness across the orientation.
    pub fn mean_thickness(&self) -> f64 {
        let len = self.true_length();
        if len == 0 {
            return 0.0;
        }
        self.weight() as f64 / len as f64
    }

    pub fn slope(&self) -> f64 {
        self.curve().slope()
    }

    pub fn rotation(&self) -> f64 {
        self.curve().rotation()
    }

    /// Radius of curvature in pixels (infinite for a straight filament).
    pub fn curvature_radius(&self) -> f64 {
        self.curve().curvature_radius()
    }
}

/// Arena of horizontal filaments with disjoint-set ancestry.
#[derive(Clone, Debug, Default)]
pub struct FilamentArena {
    filaments: Vec<Filament>,
}

impl FilamentArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.filaments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filaments.is_empty()
    }

    pub fn create(&mut self, orientation: Orientation, step: i32, sections: Vec<Section>) -> FilamentId {
        let id = FilamentId(self.filaments.len() as u32);
        self.filaments
            .push(Filament::new(id, orientation, step, sections));
        id
    }

    pub fn get(&self, id: FilamentId) -> &Filament {
        &self.filaments[id.index()]
    }

    /// Filament at the root of `id`'s ancestry.
    pub fn resolved(&self, id: FilamentId) -> &Filament {
        self.get(self.ancestor(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = FilamentId> + '_ {
        self.filaments.iter().map(|f| f.id)
    }

    /// Ids of filaments that are their own ancestor.
    pub fn roots(&self) -> Vec<FilamentId> {
        self.filaments
            .iter()
            .filter(|f| f.parent.is_none())
            .map(|f| f.id)
            .collect()
    }

    pub fn is_root(&self, id: FilamentId) -> bool {
        self.get(id).parent.is_none()
    }

    /// Ancestor lookup without path compression.
    pub fn ancestor(&self, id: FilamentId) -> FilamentId {
        let mut current = id;
        while let Some(parent) = self.filaments[current.index()].parent {
            current = parent;
        }
        current
    }

    /// Ancestor lookup compressing the traversed path.
    pub fn find(&mut self, id: FilamentId) -> FilamentId {
        let root = self.ancestor(id);
        let mut current = id;
        while let Some(parent) = self.filaments[current.index()].parent {
            if parent != root {
                self.filaments[current.index()].parent = Some(root);
            }
            current = parent;
        }
        root
    }

    /// Merge `guest` into `host` (both resolved to their ancestors).
    ///
    /// Returns the surviving ancestor. Merging a filament with itself is a no-op.
    pub fn include(&mut self, host: FilamentId, guest: FilamentId) -> FilamentId {
        let host = self.find(host);
        let guest = self.find(guest);
        if host == guest {
            return host;
        }
        let moved = std::mem::take(&mut self.filaments[guest.index()].sections);
        self.filaments[guest.index()].invalidate();
        self.filaments[guest.index()].parent = Some(host);
        self.filaments[host.index()].add_sections(moved);
        host
    }

    /// Combined thickness of several filaments at the given abscissa.
    pub fn thickness_at(&self, along: i32, ids: &[FilamentId]) -> i32 {
        ids.iter()
            .filter_map(|&id| self.resolved(id).span_at(along))
            .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
            .map(|(lo, hi)| hi - lo + 1)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests;
