use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::mask::Mask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
            Direction::Left => "LEFT",
            Direction::Right => "RIGHT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDirectionError(String);

impl fmt::Display for ParseDirectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown direction `{}` (expected up, down, left or right)", self.0)
    }
}

impl std::error::Error for ParseDirectionError {}

impl FromStr for Direction {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unclassifiable {
    /// One side of the region is below the minimum.
    TooSmall { width: u32, height: u32 },
    /// No foreground pixels to weigh on one of the axes.
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Pointing(Direction),
    Unclassifiable(Unclassifiable),
}

impl Classification {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Classification::Pointing(direction) => Some(direction),
            Classification::Unclassifiable(_) => None,
        }
    }
}

/// Decides which way a glyph points from the pixel mass in each half of its
/// bounding box. The arrowhead carries more ink than the tail, so the heavier
/// half is the pointed-to side.
pub fn classify(roi: &Mask, config: &ClassifierConfig) -> Classification {
    let w = roi.width();
    let h = roi.height();
    if w < config.min_side || h < config.min_side {
        return Classification::Unclassifiable(Unclassifiable::TooSmall { width: w, height: h });
    }

    let h_mid = h / 2;
    let w_mid = w / 2;

    let top = roi.count_in(0, 0, w, h_mid) as f64;
    let bottom = roi.count_in(0, h_mid, w, h) as f64;
    let left = roi.count_in(0, 0, w_mid, h) as f64;
    let right = roi.count_in(w_mid, 0, w, h) as f64;

    let total_v = top + bottom;
    let total_h = left + right;
    if total_v == 0.0 || total_h == 0.0 {
        return Classification::Unclassifiable(Unclassifiable::Empty);
    }

    let top_pct = top / total_v;
    let bottom_pct = bottom / total_v;
    let left_pct = left / total_h;
    let right_pct = right / total_h;

    let diff_vertical = (top_pct - bottom_pct).abs();
    let diff_horizontal = (left_pct - right_pct).abs();

    // Tall glyphs carry extra vertical mass from their shape alone.
    let aspect_ratio = w as f64 / h as f64;
    let weight = if aspect_ratio < config.tall_aspect_cutoff {
        config.tall_vertical_weight
    } else {
        config.vertical_weight
    };

    let direction = if diff_vertical * weight > diff_horizontal {
        if top_pct > bottom_pct {
            Direction::Up
        } else {
            Direction::Down
        }
    } else if left_pct > right_pct {
        Direction::Left
    } else {
        Direction::Right
    };
    Classification::Pointing(direction)
}
