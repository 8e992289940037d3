//! Grades of detected entities.
//!
//! Every candidate carries a vector of impacts in `[0, 1]`. Its intrinsic
//! grade is the weighted geometric mean of the impacts, scaled by
//! [`INTRINSIC_RATIO`] so that no purely local evidence reaches certainty.

use serde::Serialize;

/// Upper bound of an intrinsic grade.
pub const INTRINSIC_RATIO: f64 = 0.8;
/// Candidates graded below this value are discarded.
pub const MIN_INTER_GRADE: f64 = 0.1;
/// Interpretations graded at or above this value are considered good.
pub const GOOD_INTER_GRADE: f64 = 0.35;

/// Named impacts with their relative weights.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GradeImpacts {
    names: &'static [&'static str],
    weights: &'static [f64],
    values: Vec<f64>,
}

impl GradeImpacts {
    /// Values are clamped into `[0, 1]`.
    pub fn new(names: &'static [&'static str], weights: &'static [f64], values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), weights.len());
        debug_assert_eq!(names.len(), values.len());
        let values = values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect();
        Self {
            names,
            weights,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn name(&self, index: usize) -> &'static str {
        self.names[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Weighted geometric mean of the impacts, zero if any impact is zero.
    pub fn mean(&self) -> f64 {
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let mut log_sum = 0.0;
        for (&v, &w) in self.values.iter().zip(self.weights) {
            if w == 0.0 {
                continue;
            }
            if v <= 0.0 {
                return 0.0;
            }
            log_sum += w * v.ln();
        }
        (log_sum / total).exp()
    }

    /// Intrinsic grade.
    pub fn grade(&self) -> f64 {
        self.mean() * INTRINSIC_RATIO
    }
}

/// Contextual grade of an entity of intrinsic grade `grade` supported with
/// the combined ratio `ratio` (`1.0` meaning no support).
pub fn contextual(grade: f64, ratio: f64) -> f64 {
    let denominator = 1.0 + grade * (ratio - 1.0);
    if denominator <= 0.0 {
        return grade;
    }
    (grade * ratio / denominator).clamp(0.0, 1.0)
}

/// Support ratio brought by a partner of grade `partner` through a relation
/// whose full support ratio is `ratio`.
pub fn support_ratio(ratio: f64, partner: f64) -> f64 {
    1.0 + partner * (ratio - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[&str] = &["a", "b"];
    const WEIGHTS: &[f64] = &[1.0, 3.0];

    #[test]
    fn grade_is_weighted_geometric_mean() {
        let impacts = GradeImpacts::new(NAMES, WEIGHTS, vec![1.0, 0.5]);
        let expected = 0.5f64.powf(0.75);
        assert!((impacts.mean() - expected).abs() < 1e-12);
        assert!((impacts.grade() - expected * INTRINSIC_RATIO).abs() < 1e-12);
        assert_eq!(GradeImpacts::new(NAMES, WEIGHTS, vec![0.0, 1.0]).grade(), 0.0);
        assert_eq!(GradeImpacts::new(NAMES, WEIGHTS, vec![1.5, -2.0]).values(), &[1.0, 0.0]);
    }

    #[test]
    fn support_raises_contextual_grade() {
        assert!((contextual(0.5, 1.0) - 0.5).abs() < 1e-12);
        let cg = contextual(0.5, support_ratio(3.0, 1.0));
        assert!((cg - 0.75).abs() < 1e-12);
        assert!(contextual(0.6, 2.0) > 0.6);
        assert!(contextual(0.6, 2.0) < 1.0);
    }
}
