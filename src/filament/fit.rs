//! Curve fitting for filaments.
//!
//! A filament geometry is a polyline sampled along its main orientation,
//! plus a least-squares quadratic used for curvature estimates.

use nalgebra::{DMatrix, DVector, Point2};
use serde::Serialize;

/// Sampled polyline expressed as `(along, across)` pairs.
///
/// For a horizontal filament `along` is x and `across` is y.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Curve {
    samples: Vec<(f64, f64)>,
}

impl Curve {
    pub fn new(mut samples: Vec<(f64, f64)>) -> Self {
        samples.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        samples.dedup_by(|a, b| (a.0 - b.0).abs() < f64::EPSILON);
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[(f64, f64)] {
        &self.samples
    }

    pub fn first(&self) -> Option<(f64, f64)> {
        self.samples.first().copied()
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.samples.last().copied()
    }

    /// Across value at `along`, interpolated inside the samples and linearly
    /// extrapolated beyond them.
    pub fn across_at(&self, along: f64) -> f64 {
        match self.samples.len() {
            0 => 0.0,
            1 => self.samples[0].1,
            n => {
                let idx = self
                    .samples
                    .partition_point(|s| s.0 < along)
                    .clamp(1, n - 1);
                let (a0, c0) = self.samples[idx - 1];
                let (a1, c1) = self.samples[idx];
                if (a1 - a0).abs() < f64::EPSILON {
                    return c0;
                }
                c0 + (along - a0) * (c1 - c0) / (a1 - a0)
            }
        }
    }

    /// Mean slope (d across / d along) between end samples.
    pub fn slope(&self) -> f64 {
        match (self.first(), self.last()) {
            (Some(a), Some(b)) if (b.0 - a.0).abs() > f64::EPSILON => (b.1 - a.1) / (b.0 - a.0),
            _ => 0.0,
        }
    }

    /// Absolute angle (radians) between the first-half and second-half chords.
    pub fn rotation(&self) -> f64 {
        let (Some(start), Some(stop)) = (self.first(), self.last()) else {
            return 0.0;
        };
        let mid_along = (start.0 + stop.0) / 2.0;
        let mid = (mid_along, self.across_at(mid_along));
        let a1 = (mid.1 - start.1).atan2(mid.0 - start.0);
        let a2 = (stop.1 - mid.1).atan2(stop.0 - mid.0);
        (a2 - a1).abs()
    }

    /// Radius of curvature of the best quadratic fit, infinite when straight.
    pub fn curvature_radius(&self) -> f64 {
        match fit_quadratic(&self.samples) {
            Some([_, b, c]) if c.abs() > 1e-9 => (1.0 + b * b).powf(1.5) / (2.0 * c).abs(),
            _ => f64::INFINITY,
        }
    }
}

/// Least-squares fit of `across = c0 + c1 t + c2 t²`, with `t` centred on the
/// mean `along` value. Returns `None` with fewer than 3 samples.
pub fn fit_quadratic(samples: &[(f64, f64)]) -> Option<[f64; 3]> {
    let n = samples.len();
    if n < 3 {
        return None;
    }
    let mean = samples.iter().map(|s| s.0).sum::<f64>() / n as f64;
    let a = DMatrix::from_fn(n, 3, |r, c| (samples[r].0 - mean).powi(c as i32));
    let b = DVector::from_iterator(n, samples.iter().map(|s| s.1));
    let svd = a.svd(true, true);
    let x = svd.solve(&b, 1e-12).ok()?;
    Some([x[0], x[1], x[2]])
}

/// Convert an `(along, across)` sample to image coordinates.
pub fn to_point(horizontal: bool, sample: (f64, f64)) -> Point2<f64> {
    if horizontal {
        Point2::new(sample.0, sample.1)
    } else {
        Point2::new(sample.1, sample.0)
    }
}
