//! Global sheet skew.
//!
//! The skew is derived from the mean slope of the longest staff-line
//! filaments. De-skewed coordinates are obtained by rotating around the
//! sheet origin so that staff lines become horizontal.

use nalgebra::{Point2, Rotation2};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Skew {
    slope: f64,
    angle: f64,
}

impl Default for Skew {
    fn default() -> Self {
        Self::from_slope(0.0)
    }
}

impl Skew {
    pub fn from_slope(slope: f64) -> Self {
        Self {
            slope,
            angle: slope.atan(),
        }
    }

    /// Slope of horizontal lines (dy/dx).
    pub fn slope(&self) -> f64 {
        self.slope
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Slope of vertical lines expressed as dx/dy.
    pub fn vertical_slope(&self) -> f64 {
        -self.slope
    }

    /// Point coordinates once the sheet rotation has been compensated.
    pub fn deskewed(&self, x: f64, y: f64) -> Point2<f64> {
        Rotation2::new(-self.angle) * Point2::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deskew_flattens_sloped_line() {
        let skew = Skew::from_slope(0.01);
        let a = skew.deskewed(100.0, 100.0 + 1.0);
        let b = skew.deskewed(900.0, 100.0 + 9.0);
        assert!((a.y - b.y).abs() < 1e-6);
    }

    #[test]
    fn zero_skew_is_identity() {
        let p = Skew::default().deskewed(12.5, 40.0);
        assert!((p.x - 12.5).abs() < 1e-12 && (p.y - 40.0).abs() < 1e-12);
    }
}
