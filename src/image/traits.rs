/// Row-major access to a single-channel image.
pub trait ImageView {
    type Pixel: Copy;

    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn stride(&self) -> usize;

    fn row(&self, y: usize) -> &[Self::Pixel];

    fn rows(&self) -> Rows<'_, Self>
    where
        Self: Sized,
    {
        Rows { image: self, y: 0 }
    }
}

pub struct Rows<'a, I: ?Sized + ImageView> {
    image: &'a I,
    y: usize,
}

impl<'a, I: ImageView> Iterator for Rows<'a, I> {
    type Item = &'a [I::Pixel];

    fn next(&mut self) -> Option<Self::Item> {
        if self.y >= self.image.height() {
            return None;
        }
        let y = self.y;
        self.y += 1;
        Some(self.image.row(y))
    }
}

/// Foreground test addressable by signed pixel coordinates.
///
/// Coordinates outside the buffer are background.
pub trait PixelSource {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn is_fore(&self, x: i32, y: i32) -> bool;

    /// Number of foreground pixels on row `y` within `x0..=x1`.
    fn count_row(&self, y: i32, x0: i32, x1: i32) -> i32 {
        (x0..=x1).filter(|&x| self.is_fore(x, y)).count() as i32
    }

    /// Number of foreground pixels on column `x` within `y0..=y1`.
    fn count_column(&self, x: i32, y0: i32, y1: i32) -> i32 {
        (y0..=y1).filter(|&y| self.is_fore(x, y)).count() as i32
    }
}
