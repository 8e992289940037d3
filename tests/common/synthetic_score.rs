use staff_grid::image::BinaryImage;
use staff_grid::types::Rect;
use staff_grid::Scale;

pub const INTERLINE: i32 = 20;
pub const LINE_THICKNESS: i32 = 2;
pub const LEFT: i32 = 100;
pub const RIGHT: i32 = 900;
pub const BAR_WIDTH: i32 = 3;

pub fn scale() -> Scale {
    Scale::new(INTERLINE, LINE_THICKNESS as f64).with_interline_range(18, 22)
}

/// Blank page on which staves and barlines are drawn.
pub struct SyntheticScore {
    pub image: BinaryImage,
    /// Ordinate of the top line of each staff drawn.
    pub staff_tops: Vec<i32>,
}

impl SyntheticScore {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            image: BinaryImage::new(width, height),
            staff_tops: Vec::new(),
        }
    }

    /// Five lines spanning `LEFT..=RIGHT`, top line at `top`.
    pub fn staff(mut self, top: i32) -> Self {
        for i in 0..5 {
            self.image
                .fill_rect(Rect::new(LEFT, top + i * INTERLINE, RIGHT - LEFT + 1, LINE_THICKNESS));
        }
        self.staff_tops.push(top);
        self
    }

    /// Ordinate just below the bottom line of the staff at `index`.
    pub fn staff_bottom(&self, index: usize) -> i32 {
        self.staff_tops[index] + 4 * INTERLINE + LINE_THICKNESS
    }

    /// Vertical bar from the top line of staff `first` to the bottom line of
    /// staff `last`, left side at `x`.
    pub fn barline(mut self, x: i32, first: usize, last: usize) -> Self {
        let top = self.staff_tops[first];
        let bottom = self.staff_bottom(last);
        self.image.fill_rect(Rect::new(x, top, BAR_WIDTH, bottom - top));
        self
    }

    /// Barlines at both staff ends, each spanning `first..=last`.
    pub fn end_barlines(self, first: usize, last: usize) -> Self {
        self.barline(LEFT, first, last)
            .barline(RIGHT - BAR_WIDTH + 1, first, last)
    }

    /// Barlines at both ends of every staff, none joining two staves.
    pub fn staff_barlines(mut self) -> Self {
        for index in 0..self.staff_tops.len() {
            self = self.end_barlines(index, index);
        }
        self
    }

    pub fn build(self) -> BinaryImage {
        self.image
    }
}
