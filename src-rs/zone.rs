use serde::Serialize;

use crate::config::ZoneCalibration;

/// Where glyphs may appear in a frame of a given size and how large they may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Zone {
    pub y_start: u32,
    pub y_end: u32,
    pub area_min: u32,
    pub area_max: u32,
}

impl Zone {
    pub fn contains_y(&self, y: u32) -> bool {
        (self.y_start..=self.y_end).contains(&y)
    }

    pub fn accepts_area(&self, area: u32) -> bool {
        (self.area_min..=self.area_max).contains(&area)
    }
}

/// Scales the reference band linearly with height and the reference area
/// bounds with total pixel count. Recomputed for every frame.
pub fn locate(width: u32, height: u32, calibration: &ZoneCalibration) -> Zone {
    let y_start = (height as f64 * calibration.band_start_fraction) as u32;
    let y_end = (height as f64 * calibration.band_end_fraction) as u32;

    let reference_area =
        calibration.reference_width as f64 * calibration.reference_height as f64;
    let scale = if reference_area > 0.0 {
        (width as f64 * height as f64) / reference_area
    } else {
        1.0
    };

    Zone {
        y_start,
        y_end,
        area_min: (calibration.area_min_ref as f64 * scale) as u32,
        area_max: (calibration.area_max_ref as f64 * scale) as u32,
    }
}
