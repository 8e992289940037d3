//! Small geometric value types shared by every stage.
//!
//! - [`Rect`]: integer pixel rectangle (exclusive right/bottom extents).
//! - [`HorizontalSide`] / [`VerticalSide`]: side selectors used when walking
//!   peaks, staff ends and group boundaries.
//! - [`Orientation`]: direction of runs, sections and filaments.

use serde::Serialize;

/// Direction of a run, section or filament.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum HorizontalSide {
    Left,
    Right,
}

impl HorizontalSide {
    pub const ALL: [HorizontalSide; 2] = [HorizontalSide::Left, HorizontalSide::Right];

    pub fn opposite(self) -> Self {
        match self {
            HorizontalSide::Left => HorizontalSide::Right,
            HorizontalSide::Right => HorizontalSide::Left,
        }
    }

    /// -1 for left, +1 for right.
    pub fn direction(self) -> i32 {
        match self {
            HorizontalSide::Left => -1,
            HorizontalSide::Right => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VerticalSide {
    Top,
    Bottom,
}

impl VerticalSide {
    pub const ALL: [VerticalSide; 2] = [VerticalSide::Top, VerticalSide::Bottom];

    pub fn opposite(self) -> Self {
        match self {
            VerticalSide::Top => VerticalSide::Bottom,
            VerticalSide::Bottom => VerticalSide::Top,
        }
    }
}

/// Axis-aligned integer rectangle. `width`/`height` may be zero for an empty
/// rectangle; `right()`/`bottom()` are inclusive last pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning the inclusive corners `(x0, y0)`..=`(x1, y1)`.
    pub fn from_corners(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let (xa, xb) = (x0.min(x1), x0.max(x1));
        let (ya, yb) = (y0.min(y1), y0.max(y1));
        Self::new(xa, ya, xb - xa + 1, yb - ya + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Last abscissa inside the rectangle.
    pub fn right(&self) -> i32 {
        self.x + self.width - 1
    }

    /// Last ordinate inside the rectangle.
    pub fn bottom(&self) -> i32 {
        self.y + self.height - 1
    }

    pub fn center_x(&self) -> f64 {
        self.x as f64 + self.width as f64 / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        Some(Rect::from_corners(x0, y0, x1, y1))
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::from_corners(x0, y0, x1, y1)
    }

    /// Grow by `dx` on left and right, `dy` on top and bottom.
    pub fn grow(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2 * dx,
            self.height + 2 * dy,
        )
    }

    /// Abscissa overlap with `other`; negative values are a gap.
    pub fn x_overlap(&self, other: &Rect) -> i32 {
        (self.x + self.width).min(other.x + other.width) - self.x.max(other.x)
    }

    /// Abscissa gap with `other`; negative values are an overlap.
    pub fn x_gap(&self, other: &Rect) -> i32 {
        -self.x_overlap(other)
    }

    /// Ordinate overlap with `other`; negative values are a gap.
    pub fn y_overlap(&self, other: &Rect) -> i32 {
        (self.y + self.height).min(other.y + other.height) - self.y.max(other.y)
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_and_gap_are_opposite() {
        let a = Rect::new(0, 0, 10, 5);
        let b = Rect::new(15, 0, 10, 5);
        assert_eq!(a.x_gap(&b), 5);
        assert_eq!(a.x_overlap(&b), -5);
        let c = Rect::new(8, 2, 10, 5);
        assert_eq!(a.x_overlap(&c), 2);
        assert!(a.intersects(&c));
        assert!(!a.intersects(&b));
    }

    #[test]
    fn union_and_corners() {
        let a = Rect::from_corners(5, 5, 1, 1);
        assert_eq!(a, Rect::new(1, 1, 5, 5));
        assert_eq!(a.right(), 5);
        let u = a.union(&Rect::new(10, 0, 1, 1));
        assert_eq!(u, Rect::new(1, 0, 10, 6));
        assert_eq!(Rect::default().union(&a), a);
    }
}
