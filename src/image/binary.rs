use super::traits::{ImageView, PixelSource};
use crate::types::Rect;

/// Owned binary buffer, one byte per pixel (1 = foreground, 0 = background).
///
/// The grid stage only ever reads it: every phase shares the same buffer.
#[derive(Clone, Debug)]
pub struct BinaryImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl BinaryImage {
    /// All-background image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Threshold a grayscale view: pixels darker than `threshold` are foreground.
    pub fn from_gray<V: ImageView<Pixel = u8>>(gray: &V, threshold: u8) -> Self {
        let width = gray.width();
        let height = gray.height();
        let mut data = Vec::with_capacity(width * height);
        for row in gray.rows() {
            data.extend(row.iter().map(|&v| u8::from(v < threshold)));
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn set(&mut self, x: i32, y: i32, fore: bool) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.data[y as usize * self.width + x as usize] = u8::from(fore);
        }
    }

    /// Paint a rectangle as foreground, clipped to the image.
    pub fn fill_rect(&mut self, rect: Rect) {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                self.set(x, y, true);
            }
        }
    }

    /// Number of foreground pixels inside `rect`.
    pub fn fore_weight(&self, rect: &Rect) -> i32 {
        (rect.y..rect.y + rect.height)
            .map(|y| self.count_row(y, rect.x, rect.right()))
            .sum()
    }
}

impl ImageView for BinaryImage {
    type Pixel = u8;

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn stride(&self) -> usize {
        self.width
    }

    fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }
}

impl PixelSource for BinaryImage {
    fn width(&self) -> i32 {
        self.width as i32
    }

    fn height(&self) -> i32 {
        self.height as i32
    }

    #[inline]
    fn is_fore(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return false;
        }
        self.data[y as usize * self.width + x as usize] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageU8;

    #[test]
    fn thresholding_marks_dark_pixels() {
        let gray = [0u8, 200, 50, 255];
        let view = ImageU8 {
            w: 2,
            h: 2,
            stride: 2,
            data: &gray,
        };
        let img = BinaryImage::from_gray(&view, 128);
        assert!(img.is_fore(0, 0));
        assert!(!img.is_fore(1, 0));
        assert!(img.is_fore(0, 1));
        assert!(!img.is_fore(1, 1));
        assert!(!img.is_fore(-1, 0));
        assert!(!img.is_fore(2, 1));
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut img = BinaryImage::new(10, 10);
        img.fill_rect(Rect::new(8, 8, 5, 5));
        assert_eq!(img.fore_weight(&Rect::new(0, 0, 10, 10)), 4);
    }
}
