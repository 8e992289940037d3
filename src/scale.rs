//! Pixel scale of a sheet.
//!
//! Every tunable of the grid stage is expressed as a fraction of interline
//! (or of line thickness) and converted to pixels here, once per sheet or
//! once per staff when a staff has its own specific interline.

use crate::error::{GridError, Result};
use serde::{Deserialize, Serialize};

/// Interline range observed on the sheet, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlineScale {
    pub min: i32,
    pub main: i32,
    pub max: i32,
}

impl InterlineScale {
    pub fn new(main: i32) -> Self {
        Self {
            min: main,
            main,
            max: main,
        }
    }

    pub fn with_range(min: i32, main: i32, max: i32) -> Self {
        Self { min, main, max }
    }

    /// Convert an interline fraction to a rounded pixel count.
    pub fn to_pixels(&self, fraction: f64) -> i32 {
        (fraction * self.main as f64).round() as i32
    }

    /// Convert an interline fraction to a precise pixel value.
    pub fn to_pixels_f(&self, fraction: f64) -> f64 {
        fraction * self.main as f64
    }
}

/// Sheet scale as estimated upstream (interline, line thickness).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub interline: InterlineScale,
    /// Interline of cue/small staves, when the sheet has two populations.
    #[serde(default)]
    pub small_interline: Option<InterlineScale>,
    /// Typical staff line thickness in pixels.
    pub line_thickness: f64,
    /// Maximum staff line thickness in pixels.
    pub max_line_thickness: i32,
}

impl Scale {
    pub fn new(interline: i32, line_thickness: f64) -> Self {
        Self {
            interline: InterlineScale::new(interline),
            small_interline: None,
            line_thickness,
            max_line_thickness: (line_thickness * 1.5).ceil().max(1.0) as i32,
        }
    }

    pub fn with_interline_range(mut self, min: i32, max: i32) -> Self {
        self.interline.min = min;
        self.interline.max = max;
        self
    }

    pub fn with_small_interline(mut self, small: InterlineScale) -> Self {
        self.small_interline = Some(small);
        self
    }

    pub fn with_max_line_thickness(mut self, max: i32) -> Self {
        self.max_line_thickness = max;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let il = &self.interline;
        if il.main < 4 || il.min > il.main || il.max < il.main || il.min <= 0 {
            return Err(GridError::InvalidScale(format!(
                "interline {}..{}..{}",
                il.min, il.main, il.max
            )));
        }
        if !(self.line_thickness > 0.0) || self.max_line_thickness <= 0 {
            return Err(GridError::InvalidScale(format!(
                "line thickness {:.2} (max {})",
                self.line_thickness, self.max_line_thickness
            )));
        }
        if let Some(small) = &self.small_interline {
            if small.main <= 0 || small.main >= il.main {
                return Err(GridError::InvalidScale(format!(
                    "small interline {} vs {}",
                    small.main, il.main
                )));
            }
        }
        Ok(())
    }

    pub fn interline(&self) -> i32 {
        self.interline.main
    }

    /// True when the sheet exhibits more than one interline population.
    pub fn is_multi_interline(&self) -> bool {
        self.small_interline.is_some()
    }

    pub fn to_pixels(&self, fraction: f64) -> i32 {
        self.interline.to_pixels(fraction)
    }

    pub fn to_pixels_f(&self, fraction: f64) -> f64 {
        self.interline.to_pixels_f(fraction)
    }

    /// Convert a fraction of line thickness to pixels.
    pub fn line_to_pixels_f(&self, fraction: f64) -> f64 {
        fraction * self.line_thickness
    }

    /// Convert a fraction of the square interline to a pixel area.
    pub fn area_to_pixels(&self, fraction: f64) -> i32 {
        let il = self.interline.main as f64;
        (fraction * il * il).round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_round_to_pixels() {
        let scale = Scale::new(20, 2.0);
        assert_eq!(scale.to_pixels(0.175), 4);
        assert_eq!(scale.to_pixels(1.5), 30);
        assert_eq!(scale.area_to_pixels(0.2), 80);
        assert!((scale.to_pixels_f(0.175) - 3.5).abs() < 1e-9);
        assert_eq!(scale.max_line_thickness, 3);
    }

    #[test]
    fn invalid_scales_are_rejected() {
        assert!(Scale::new(20, 2.0).validate().is_ok());
        assert!(Scale::new(2, 2.0).validate().is_err());
        assert!(Scale::new(20, 0.0).validate().is_err());
        let bad_range = Scale::new(20, 2.0).with_interline_range(22, 24);
        assert!(bad_range.validate().is_err());
    }
}
