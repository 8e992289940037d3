use super::traits::PixelSource;
use nalgebra::Point2;
use serde::Serialize;

/// Foreground statistics of the vertical band between two lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CoreData {
    /// Number of rows examined.
    pub length: i32,
    /// Ratio of background pixels over the whole band.
    pub white_ratio: f64,
    /// Longest run of consecutive rows containing no foreground.
    pub gap: i32,
}

/// A straight segment used as left or right limit of a vertical band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandLine {
    pub top: Point2<f64>,
    pub bottom: Point2<f64>,
}

impl BandLine {
    pub fn new(top: Point2<f64>, bottom: Point2<f64>) -> Self {
        Self { top, bottom }
    }

    pub fn vertical(x: f64, y0: f64, y1: f64) -> Self {
        Self::new(Point2::new(x, y0), Point2::new(x, y1))
    }

    pub fn x_at(&self, y: f64) -> f64 {
        let dy = self.bottom.y - self.top.y;
        if dy.abs() < f64::EPSILON {
            return self.top.x;
        }
        self.top.x + (y - self.top.y) * (self.bottom.x - self.top.x) / dy
    }
}

/// Analyse the band between `left` and `right`, row by row.
///
/// Rows run from the lower of the two tops to the higher of the two bottoms.
pub fn vertical_core<P: PixelSource + ?Sized>(
    source: &P,
    left: &BandLine,
    right: &BandLine,
) -> CoreData {
    let y_min = left.top.y.max(right.top.y).ceil() as i32;
    let y_max = left.bottom.y.min(right.bottom.y).floor() as i32;
    if y_max < y_min {
        return CoreData::default();
    }

    let mut total = 0i64;
    let mut white = 0i64;
    let mut gap = 0;
    let mut max_gap = 0;
    for y in y_min..=y_max {
        let yf = y as f64;
        let x0 = left.x_at(yf).round() as i32;
        let x1 = right.x_at(yf).round() as i32;
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let fore = source.count_row(y, x0, x1);
        let width = (x1 - x0 + 1) as i64;
        total += width;
        white += width - fore as i64;
        if fore == 0 {
            gap += 1;
            max_gap = max_gap.max(gap);
        } else {
            gap = 0;
        }
    }

    CoreData {
        length: y_max - y_min + 1,
        white_ratio: if total > 0 {
            white as f64 / total as f64
        } else {
            1.0
        },
        gap: max_gap,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BinaryImage;
    use crate::types::Rect;

    #[test]
    fn core_reports_longest_gap() {
        let mut img = BinaryImage::new(20, 40);
        img.fill_rect(Rect::new(5, 0, 3, 10));
        img.fill_rect(Rect::new(5, 16, 3, 24));
        let left = BandLine::vertical(5.0, 0.0, 39.0);
        let right = BandLine::vertical(7.0, 0.0, 39.0);
        let core = vertical_core(&img, &left, &right);
        assert_eq!(core.length, 40);
        assert_eq!(core.gap, 6);
        assert!((core.white_ratio - 6.0 / 40.0).abs() < 1e-9);
    }
}
