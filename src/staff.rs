//! Staves built from line clusters.
//!
//! A [`Staff`] keeps a frozen copy of each line geometry, so it no longer
//! depends on the filament arena once built. The [`StaffManager`] keeps the
//! sheet staves in layout order and answers neighbourhood queries.

use crate::filament::fit::Curve;
use crate::filament::{Filament, FilamentId};
use crate::sig::InterId;
use crate::types::{HorizontalSide, Rect, VerticalSide};
use nalgebra::Point2;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StaffId(pub u32);

/// Geometry of one staff line.
#[derive(Clone, Debug, Serialize)]
pub struct StaffLine {
    pub filament: FilamentId,
    curve: Curve,
    bounds: Rect,
    thickness: f64,
    true_length: i32,
}

impl StaffLine {
    pub fn from_filament(fil: &Filament) -> Self {
        Self {
            filament: fil.id,
            curve: fil.curve().clone(),
            bounds: fil.bounds(),
            thickness: fil.mean_thickness(),
            true_length: fil.true_length(),
        }
    }

    pub fn y_at(&self, x: f64) -> f64 {
        self.curve.across_at(x)
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn true_length(&self) -> i32 {
        self.true_length
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub fn end_point(&self, side: HorizontalSide) -> Point2<f64> {
        let sample = match side {
            HorizontalSide::Left => self.curve.first(),
            HorizontalSide::Right => self.curve.last(),
        };
        sample.map_or_else(Point2::origin, |(x, y)| Point2::new(x, y))
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Staff {
    pub id: StaffId,
    left: f64,
    right: f64,
    /// Specific interline of this staff, in pixels.
    interline: i32,
    lines: Vec<StaffLine>,
    small: bool,
    short: bool,
    /// Barline interpretations of the staff, left to right.
    barlines: Vec<InterId>,
}

impl Staff {
    pub fn new(id: StaffId, left: f64, right: f64, interline: i32, lines: Vec<StaffLine>) -> Self {
        Self {
            id,
            left,
            right,
            interline,
            lines,
            small: false,
            short: false,
            barlines: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[StaffLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_one_line(&self) -> bool {
        self.lines.len() == 1
    }

    pub fn is_tablature(&self) -> bool {
        self.lines.len() == 4 || self.lines.len() == 6
    }

    pub fn first_line(&self) -> &StaffLine {
        &self.lines[0]
    }

    pub fn last_line(&self) -> &StaffLine {
        &self.lines[self.lines.len() - 1]
    }

    pub fn line(&self, side: VerticalSide) -> &StaffLine {
        match side {
            VerticalSide::Top => self.first_line(),
            VerticalSide::Bottom => self.last_line(),
        }
    }

    pub fn interline(&self) -> i32 {
        self.interline
    }

    pub fn abscissa(&self, side: HorizontalSide) -> f64 {
        match side {
            HorizontalSide::Left => self.left,
            HorizontalSide::Right => self.right,
        }
    }

    pub fn set_abscissa(&mut self, side: HorizontalSide, x: f64) {
        match side {
            HorizontalSide::Left => self.left = x,
            HorizontalSide::Right => self.right = x,
        }
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    /// Mean thickness of the staff lines.
    pub fn mean_line_thickness(&self) -> f64 {
        if self.lines.is_empty() {
            return 0.0;
        }
        self.lines.iter().map(StaffLine::thickness).sum::<f64>() / self.lines.len() as f64
    }

    /// Distance between first and last lines at abscissa `x`.
    pub fn height_at(&self, x: f64) -> f64 {
        self.last_line().y_at(x) - self.first_line().y_at(x)
    }

    /// Ordinate of the staff middle at abscissa `x`.
    pub fn mid_y(&self, x: f64) -> f64 {
        (self.first_line().y_at(x) + self.last_line().y_at(x)) / 2.0
    }

    pub fn bounds(&self) -> Rect {
        let lines = self
            .lines
            .iter()
            .map(StaffLine::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        let left = self.left.floor() as i32;
        let right = self.right.ceil() as i32;
        Rect::from_corners(left, lines.y, right.max(left), lines.bottom())
    }

    pub fn is_small(&self) -> bool {
        self.small
    }

    pub fn set_small(&mut self) {
        self.small = true;
    }

    /// True when the staff shares its vertical band with another staff.
    pub fn is_short(&self) -> bool {
        self.short
    }

    pub fn set_short(&mut self) {
        self.short = true;
    }

    pub fn barlines(&self) -> &[InterId] {
        &self.barlines
    }

    pub fn set_barlines(&mut self, barlines: Vec<InterId>) {
        self.barlines = barlines;
    }

    pub fn x_overlaps(&self, other: &Staff) -> bool {
        self.left.max(other.left) < self.right.min(other.right)
    }

    pub fn y_overlaps(&self, other: &Staff) -> bool {
        let top = |s: &Staff| s.first_line().end_point(HorizontalSide::Left).y;
        let bottom = |s: &Staff| s.last_line().end_point(HorizontalSide::Left).y;
        bottom(self).min(bottom(other)) > top(self).max(top(other))
    }
}

/// Sheet staves, in layout order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StaffManager {
    staves: Vec<Staff>,
}

impl StaffManager {
    pub fn new(staves: Vec<Staff>) -> Self {
        Self { staves }
    }

    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    pub fn staves_mut(&mut self) -> &mut [Staff] {
        &mut self.staves
    }

    pub fn into_staves(self) -> Vec<Staff> {
        self.staves
    }

    pub fn len(&self) -> usize {
        self.staves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staves.is_empty()
    }

    pub fn index_of(&self, id: StaffId) -> Option<usize> {
        self.staves.iter().position(|s| s.id == id)
    }

    pub fn staff(&self, id: StaffId) -> Option<&Staff> {
        self.staves.iter().find(|s| s.id == id)
    }

    /// Nearest staff on the given horizontal side sharing the same ordinates.
    pub fn hori_neighbor(&self, index: usize, side: HorizontalSide) -> Option<usize> {
        let current = &self.staves[index];
        let found = |&i: &usize| current.y_overlaps(&self.staves[i]);
        match side {
            HorizontalSide::Left => (0..index).rev().find(found),
            HorizontalSide::Right => (index + 1..self.staves.len()).find(found),
        }
    }

    /// Staves immediately above or below, including the horizontal neighbours
    /// of the first one found, sorted by id.
    pub fn vert_neighbors(&self, index: usize, side: VerticalSide) -> Vec<usize> {
        let current = &self.staves[index];
        let overlapping = |&i: &usize| current.x_overlaps(&self.staves[i]);
        let other = match side {
            VerticalSide::Top => (0..index).rev().find(overlapping),
            VerticalSide::Bottom => (index + 1..self.staves.len()).find(overlapping),
        };
        let Some(other) = other else {
            return Vec::new();
        };

        let mut neighbors = vec![other];
        for h_side in HorizontalSide::ALL {
            let mut next = other;
            while let Some(n) = self.hori_neighbor(next, h_side) {
                neighbors.push(n);
                next = n;
            }
        }
        neighbors.retain(|&i| i != index);
        neighbors.sort_by_key(|&i| self.staves[i].id);
        neighbors.dedup();
        neighbors
    }

    /// Flag staves displayed side by side with another staff.
    pub fn detect_short_staves(&mut self) {
        let shorts: Vec<usize> = (0..self.staves.len())
            .filter(|&i| {
                self.hori_neighbor(i, HorizontalSide::Left).is_some()
                    || self.hori_neighbor(i, HorizontalSide::Right).is_some()
            })
            .collect();
        for i in shorts {
            self.staves[i].set_short();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(id: u32, left: f64, right: f64, top: f64) -> Staff {
        let lines = (0..5)
            .map(|i| {
                let y = top + 20.0 * i as f64;
                StaffLine {
                    filament: FilamentId(id * 10 + i),
                    curve: Curve::new(vec![(left, y), (right, y)]),
                    bounds: Rect::new(left as i32, y as i32, (right - left) as i32 + 1, 2),
                    thickness: 2.0,
                    true_length: (right - left) as i32 + 1,
                }
            })
            .collect();
        Staff::new(StaffId(id), left, right, 20, lines)
    }

    #[test]
    fn side_by_side_staves_are_short() {
        // 1 and 2 span the page, 3 and 4 share one band, 5 spans the page.
        let mut manager = StaffManager::new(vec![
            staff(1, 0.0, 1000.0, 100.0),
            staff(2, 0.0, 1000.0, 300.0),
            staff(3, 0.0, 450.0, 500.0),
            staff(4, 550.0, 1000.0, 500.0),
            staff(5, 0.0, 1000.0, 700.0),
        ]);
        manager.detect_short_staves();
        let shorts: Vec<bool> = manager.staves().iter().map(Staff::is_short).collect();
        assert_eq!(shorts, vec![false, false, true, true, false]);

        assert_eq!(manager.vert_neighbors(1, VerticalSide::Bottom), vec![2, 3]);
        assert_eq!(manager.vert_neighbors(3, VerticalSide::Top), vec![1]);
        assert_eq!(manager.vert_neighbors(4, VerticalSide::Top), vec![2, 3]);
        assert!(manager.vert_neighbors(0, VerticalSide::Top).is_empty());
    }

    #[test]
    fn staff_geometry() {
        let s = staff(1, 100.0, 900.0, 200.0);
        assert!((s.height_at(500.0) - 80.0).abs() < 1e-9);
        assert!((s.mid_y(500.0) - 240.0).abs() < 1e-9);
        assert_eq!(s.bounds(), Rect::from_corners(100, 200, 900, 281));
        assert!(!s.is_tablature());
    }
}
