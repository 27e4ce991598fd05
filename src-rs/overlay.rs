use std::fs;
use std::path::{Path, PathBuf};

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{ImageError, ImageResult, Rgb, RgbImage};
use tracing::{info, warn};

use crate::frame::Frame;
use crate::pipeline::{DetectionObserver, DetectionResult};

const ACCEPTED: Rgb<u8> = Rgb([0, 255, 0]);
const DROPPED: Rgb<u8> = Rgb([255, 69, 58]);
const BAND: Rgb<u8> = Rgb([10, 132, 255]);

/// Copy of the frame with the HUD band marked, each glyph boxed and
/// labelled `index:DIRECTION`, and unclassifiable regions boxed in red.
pub fn render(frame: &Frame, result: &DetectionResult) -> RgbImage {
    let mut out = frame.clone();
    let (width, _) = out.dimensions();

    draw_hline(&mut out, result.zone.y_start, BAND);
    draw_hline(&mut out, result.zone.y_end, BAND);

    for (idx, glyph) in result.glyphs.iter().enumerate() {
        let r = glyph.region;
        draw_rect_outline(&mut out, r.x, r.y, r.width, r.height, ACCEPTED, 2);
        let label = format!("{}:{}", idx + 1, glyph.direction);
        draw_bitmap_text(&mut out, r.x as i32, r.y as i32 - 12, &label, ACCEPTED);
    }
    for r in &result.unclassified {
        draw_rect_outline(&mut out, r.x, r.y, r.width, r.height, DROPPED, 1);
        draw_bitmap_text(&mut out, r.x as i32, r.y as i32 + r.height as i32 + 3, "?", DROPPED);
    }

    if width > 0 {
        let summary = format!("{} glyphs", result.glyphs.len());
        draw_bitmap_text(&mut out, 4, result.zone.y_start as i32 - 22, &summary, BAND);
    }
    out
}

pub fn save(frame: &Frame, result: &DetectionResult, path: &Path) -> ImageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(ImageError::IoError)?;
        }
    }
    render(frame, result).save(path)
}

/// Writes the overlay image after every detection.
#[derive(Debug, Clone)]
pub struct OverlayWriter {
    path: PathBuf,
}

impl OverlayWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DetectionObserver for OverlayWriter {
    fn on_detection(&mut self, frame: &Frame, result: &DetectionResult) {
        match save(frame, result, &self.path) {
            Ok(()) => info!(path = %self.path.display(), "wrote debug overlay"),
            Err(error) => warn!(path = %self.path.display(), %error, "failed to write debug overlay"),
        }
    }
}

fn draw_hline(img: &mut RgbImage, y: u32, color: Rgb<u8>) {
    if y >= img.height() {
        return;
    }
    for x in (0..img.width()).step_by(4) {
        img.put_pixel(x, y, color);
        if x + 1 < img.width() {
            img.put_pixel(x + 1, y, color);
        }
    }
}

fn draw_rect_outline(
    img: &mut RgbImage,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    color: Rgb<u8>,
    thickness: u32,
) {
    if w == 0 || h == 0 || img.width() == 0 || img.height() == 0 {
        return;
    }
    let img_w = img.width();
    let img_h = img.height();

    let x0 = x.min(img_w - 1);
    let y0 = y.min(img_h - 1);
    let x1 = (x + w - 1).min(img_w - 1);
    let y1 = (y + h - 1).min(img_h - 1);

    // Grow outwards so the glyph pixels themselves stay visible.
    for t in 1..=thickness.max(1) {
        let tx0 = x0.saturating_sub(t);
        let ty0 = y0.saturating_sub(t);
        let tx1 = (x1 + t).min(img_w - 1);
        let ty1 = (y1 + t).min(img_h - 1);

        for xx in tx0..=tx1 {
            img.put_pixel(xx, ty0, color);
            img.put_pixel(xx, ty1, color);
        }
        for yy in ty0..=ty1 {
            img.put_pixel(tx0, yy, color);
            img.put_pixel(tx1, yy, color);
        }
    }
}

fn draw_bitmap_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += 8;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..8 {
                if (*row >> col_idx) & 1 == 0 {
                    continue;
                }
                let tx = cursor_x + col_idx;
                let ty = y + row_idx as i32;
                if tx >= 0 && ty >= 0 && tx < img.width() as i32 && ty < img.height() as i32 {
                    img.put_pixel(tx as u32, ty as u32, color);
                }
            }
        }
        cursor_x += 8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Direction;
    use crate::glyph::Region;
    use crate::pipeline::Glyph;
    use crate::zone::Zone;
    use tempfile::tempdir;

    fn sample() -> DetectionResult {
        DetectionResult {
            frame_width: 200,
            frame_height: 100,
            zone: Zone {
                y_start: 40,
                y_end: 70,
                area_min: 10,
                area_max: 100,
            },
            glyphs: vec![Glyph {
                region: Region {
                    x: 50,
                    y: 50,
                    width: 10,
                    height: 10,
                    area: 60,
                },
                direction: Direction::Left,
            }],
            unclassified: vec![Region {
                x: 190,
                y: 95,
                width: 20,
                height: 20,
                area: 12,
            }],
        }
    }

    #[test]
    fn boxes_are_drawn_around_regions() {
        let frame = Frame::new(200, 100);
        let out = render(&frame, &sample());
        assert_eq!(out.get_pixel(49, 55), &ACCEPTED);
        assert_eq!(out.get_pixel(60, 55), &ACCEPTED);
        // Interior untouched.
        assert_eq!(out.get_pixel(55, 55), &Rgb([0, 0, 0]));
        // Clipped at the frame edge without panicking.
        assert_eq!(out.get_pixel(189, 96), &DROPPED);
    }

    #[test]
    fn label_ink_lands_above_the_box() {
        let frame = Frame::new(200, 100);
        let out = render(&frame, &sample());
        let ink = (38..46)
            .flat_map(|y| (50..98).map(move |x| (x, y)))
            .filter(|(x, y)| out.get_pixel(*x, *y) == &ACCEPTED)
            .count();
        assert!(ink > 0);
    }

    #[test]
    fn save_writes_png_into_new_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("debug").join("debug_arrows.png");
        let frame = Frame::new(200, 100);
        save(&frame, &sample(), &path).unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (200, 100));
    }
}
