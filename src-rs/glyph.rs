use std::collections::VecDeque;

use serde::Serialize;
use tracing::debug;

use crate::config::GlyphConfig;
use crate::mask::Mask;
use crate::zone::Zone;

/// Bounding geometry of one externally connected blob in the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Pixels enclosed by the blob's outer boundary, holes included.
    pub area: u32,
}

impl Region {
    pub fn center_x(&self) -> u32 {
        self.x + self.width / 2
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Extracts candidate glyphs from the mask and keeps those that fit the zone
/// and glyph proportions, ordered left to right.
pub fn find_glyphs(mask: &Mask, zone: &Zone, config: &GlyphConfig) -> Vec<Region> {
    let candidates = outer_components(mask);
    let total = candidates.len();

    let mut accepted: Vec<Region> = candidates
        .into_iter()
        .filter(|region| {
            if !zone.contains_y(region.y) {
                return false;
            }
            if !zone.accepts_area(region.area) {
                debug!(?region, "discarded: area outside {}..={}", zone.area_min, zone.area_max);
                return false;
            }
            let ratio = region.aspect_ratio();
            if ratio < config.aspect_min || ratio > config.aspect_max {
                debug!(?region, ratio, "discarded: aspect ratio");
                return false;
            }
            true
        })
        .collect();

    // Stable: equal centers keep raster discovery order.
    accepted.sort_by_key(Region::center_x);
    debug!(candidates = total, accepted = accepted.len(), "glyph filtering done");
    accepted
}

/// Returns one region per outer boundary, in raster order of each blob's
/// first pixel. Blobs nested inside another blob's hole are absorbed into it.
pub fn outer_components(mask: &Mask) -> Vec<Region> {
    let width = mask.width();
    let height = mask.height();
    let filled = fill_holes(mask);
    let total = (width as usize) * (height as usize);
    let mut visited = vec![false; total];
    let mut regions = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let start = (y * width + x) as usize;
            if visited[start] || !filled[start] {
                continue;
            }

            let mut queue = VecDeque::new();
            queue.push_back(start);
            visited[start] = true;

            let mut minx = x;
            let mut maxx = x;
            let mut miny = y;
            let mut maxy = y;
            let mut count: u32 = 0;

            while let Some(node) = queue.pop_front() {
                let cx = (node as u32) % width;
                let cy = (node as u32) / width;
                count += 1;

                minx = minx.min(cx);
                maxx = maxx.max(cx);
                miny = miny.min(cy);
                maxy = maxy.max(cy);

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let nx = cx as i64 + dx;
                        let ny = cy as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                            continue;
                        }
                        let next = (ny as usize) * (width as usize) + nx as usize;
                        if filled[next] && !visited[next] {
                            visited[next] = true;
                            queue.push_back(next);
                        }
                    }
                }
            }

            regions.push(Region {
                x: minx,
                y: miny,
                width: maxx - minx + 1,
                height: maxy - miny + 1,
                area: count,
            });
        }
    }

    regions
}

/// Foreground plus every background pixel not 4-connected to the border.
fn fill_holes(mask: &Mask) -> Vec<bool> {
    let width = mask.width();
    let height = mask.height();
    let total = (width as usize) * (height as usize);
    if total == 0 {
        return Vec::new();
    }
    let mut outside = vec![false; total];
    let mut queue = VecDeque::new();

    let mut seed = |x: u32, y: u32, queue: &mut VecDeque<usize>| {
        let idx = (y * width + x) as usize;
        if !mask.get(x, y) && !outside[idx] {
            outside[idx] = true;
            queue.push_back(idx);
        }
    };
    for x in 0..width {
        seed(x, 0, &mut queue);
        seed(x, height.saturating_sub(1), &mut queue);
    }
    for y in 0..height {
        seed(0, y, &mut queue);
        seed(width.saturating_sub(1), y, &mut queue);
    }

    while let Some(node) = queue.pop_front() {
        let cx = (node as u32) % width;
        let cy = (node as u32) / width;
        let mut visit = |nx: u32, ny: u32| {
            let idx = (ny * width + nx) as usize;
            if !outside[idx] && !mask.get(nx, ny) {
                outside[idx] = true;
                queue.push_back(idx);
            }
        };
        if cx > 0 {
            visit(cx - 1, cy);
        }
        if cx + 1 < width {
            visit(cx + 1, cy);
        }
        if cy > 0 {
            visit(cx, cy - 1);
        }
        if cy + 1 < height {
            visit(cx, cy + 1);
        }
    }

    outside.into_iter().map(|o| !o).collect()
}
