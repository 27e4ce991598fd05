use image::Pixel;

use crate::config::SegmentConfig;
use crate::frame::Frame;

/// Binary image, row-major, same dimensions as the frame it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Builds a mask from text rows, `#` for set pixels. Rows must share a length.
    #[cfg(test)]
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0) as u32;
        let mut mask = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch == '#' {
                    mask.set(x as u32, y as u32, true);
                }
            }
        }
        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.index(x, y);
        self.bits[idx] = value;
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Set pixels inside the half-open box `[x0, x1) x [y0, y1)`.
    pub fn count_in(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> usize {
        let mut total = 0;
        for y in y0..y1.min(self.height) {
            let row = self.index(0, y);
            total += self.bits[row + x0 as usize..row + x1.min(self.width) as usize]
                .iter()
                .filter(|b| **b)
                .count();
        }
        total
    }

    /// Copies the sub-grid at `(x, y)` of size `w x h`, clipped to the mask.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Mask {
        let x1 = (x + w).min(self.width);
        let y1 = (y + h).min(self.height);
        let mut out = Mask::new(x1.saturating_sub(x), y1.saturating_sub(y));
        for yy in y..y1 {
            for xx in x..x1 {
                if self.get(xx, yy) {
                    out.set(xx - x, yy - y, true);
                }
            }
        }
        out
    }

    /// Morphological closing with a full 2x2 square: dilate, then erode with
    /// the reflected element. The dilation is computed one pixel past the right
    /// and bottom edges so the result is a superset of the input that never
    /// grows along the border, and isolated pixels stay in place.
    ///
    /// OpenCV's 2x2 `MORPH_ELLIPSE` is the three-pixel element `[[0,1],[1,1]]`,
    /// not this square, so results can differ around diagonal gaps. Thresholds
    /// tuned against that kernel may need adjusting here.
    pub fn close_2x2(&self) -> Mask {
        let (w, h) = (self.width, self.height);
        if w == 0 || h == 0 {
            return self.clone();
        }

        let src = |x: u32, y: u32| x < w && y < h && self.get(x, y);
        let mut dilated = Mask::new(w + 1, h + 1);
        for y in 0..=h {
            for x in 0..=w {
                let hit = src(x, y)
                    || (x > 0 && src(x - 1, y))
                    || (y > 0 && src(x, y - 1))
                    || (x > 0 && y > 0 && src(x - 1, y - 1));
                if hit {
                    dilated.set(x, y, true);
                }
            }
        }

        let mut closed = Mask::new(w, h);
        for y in 0..h {
            for x in 0..w {
                if dilated.get(x, y)
                    && dilated.get(x + 1, y)
                    && dilated.get(x, y + 1)
                    && dilated.get(x + 1, y + 1)
                {
                    closed.set(x, y, true);
                }
            }
        }
        closed
    }
}

/// Thresholds the frame against the near-white band and closes small gaps
/// left by anti-aliasing.
pub fn segment(frame: &Frame, config: &SegmentConfig) -> Mask {
    let (width, height) = frame.dimensions();
    let mut mask = Mask::new(width, height);
    for (x, y, pixel) in frame.enumerate_pixels() {
        let channels = pixel.channels();
        let inside = (0..3).all(|c| channels[c] >= config.lower[c] && channels[c] <= config.upper[c]);
        if inside {
            mask.set(x, y, true);
        }
    }
    mask.close_2x2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn black_frame_gives_empty_mask() {
        let frame = Frame::new(64, 32);
        let mask = segment(&frame, &SegmentConfig::default());
        assert_eq!(mask.count(), 0);
        assert_eq!((mask.width(), mask.height()), (64, 32));
    }

    #[test]
    fn threshold_requires_every_channel() {
        let mut frame = Frame::new(4, 1);
        frame.put_pixel(0, 0, Rgb([220, 220, 220]));
        frame.put_pixel(1, 0, Rgb([255, 255, 219]));
        frame.put_pixel(2, 0, Rgb([10, 10, 10]));
        frame.put_pixel(3, 0, Rgb([255, 255, 255]));

        let mask = segment(&frame, &SegmentConfig::default());
        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
        assert!(!mask.get(2, 0));
        assert!(mask.get(3, 0));
    }

    #[test]
    fn custom_band_selects_other_colors() {
        let mut frame = Frame::new(2, 1);
        frame.put_pixel(0, 0, Rgb([250, 200, 0]));
        frame.put_pixel(1, 0, Rgb([255, 255, 255]));
        let config = SegmentConfig {
            lower: [230, 180, 0],
            upper: [255, 220, 40],
        };
        let mask = segment(&frame, &config);
        assert!(mask.get(0, 0));
        assert!(!mask.get(1, 0));
    }

    #[test]
    fn closing_bridges_one_pixel_gap() {
        let mask = Mask::from_rows(&[
            ".....", //
            ".#.#.",
            ".....",
        ]);
        let closed = mask.close_2x2();
        assert!(closed.get(2, 1));
        assert!(closed.get(1, 1));
        assert!(closed.get(3, 1));
        assert_eq!(closed.count(), 3);
    }

    #[test]
    fn closing_keeps_isolated_pixel_and_rectangles() {
        let mask = Mask::from_rows(&[
            "#.......",
            "........",
            "...###..",
            "...###..",
            "........",
        ]);
        assert_eq!(mask.close_2x2(), mask);
    }

    #[test]
    fn closing_bridges_vertical_gap_at_border() {
        let mask = Mask::from_rows(&[
            "..#", //
            "...",
            "..#",
        ]);
        let closed = mask.close_2x2();
        assert!(closed.get(2, 1));
        assert_eq!(closed.count(), 3);
    }

    #[test]
    fn count_in_and_crop_agree() {
        let mask = Mask::from_rows(&[
            "##..", //
            "#...",
            "..##",
        ]);
        assert_eq!(mask.count_in(0, 0, 2, 2), 3);
        assert_eq!(mask.count_in(2, 0, 4, 3), 2);
        let roi = mask.crop(1, 1, 3, 2);
        assert_eq!((roi.width(), roi.height()), (3, 2));
        assert_eq!(roi.count(), 2);
        assert_eq!(mask.crop(3, 2, 10, 10).count(), 1);
    }
}
