use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fd_lock::{RwLock, RwLockWriteGuard};
use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::{classify, Classification, Direction};
use crate::config::Config;
use crate::error::PipelineError;
use crate::frame::{Frame, FrameSource};
use crate::glyph::{find_glyphs, Region};
use crate::mask::{segment, Mask};
use crate::zone::{locate, Zone};

/// An accepted region and the way it points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Glyph {
    pub region: Region,
    pub direction: Direction,
}

/// Classified glyphs, left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub frame_width: u32,
    pub frame_height: u32,
    pub zone: Zone,
    pub glyphs: Vec<Glyph>,
    /// Regions that passed filtering but could not be given a direction.
    pub unclassified: Vec<Region>,
}

impl DetectionResult {
    pub fn directions(&self) -> Vec<Direction> {
        self.glyphs.iter().map(|g| g.direction).collect()
    }

    /// True when no region survived filtering at all.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty() && self.unclassified.is_empty()
    }
}

/// Sees the frame and the final glyph list once detection is done.
pub trait DetectionObserver {
    fn on_detection(&mut self, frame: &Frame, result: &DetectionResult);
}

/// Segment, locate, filter and classify a frame already in hand.
pub fn detect_frame(frame: &Frame, config: &Config) -> DetectionResult {
    let (width, height) = frame.dimensions();
    let mask = segment(frame, &config.segment);
    let zone = locate(width, height, &config.zone);
    debug!(?zone, foreground = mask.count(), "segmented frame");
    detect_mask(&mask, zone, config)
}

pub fn detect_mask(mask: &Mask, zone: Zone, config: &Config) -> DetectionResult {
    let regions = find_glyphs(mask, &zone, &config.glyph);

    let mut glyphs = Vec::with_capacity(regions.len());
    let mut unclassified = Vec::new();
    for region in regions {
        let roi = mask.crop(region.x, region.y, region.width, region.height);
        match classify(&roi, &config.classifier) {
            Classification::Pointing(direction) => glyphs.push(Glyph { region, direction }),
            Classification::Unclassifiable(reason) => {
                debug!(?region, ?reason, "dropping unclassifiable glyph");
                unclassified.push(region);
            }
        }
    }

    DetectionResult {
        frame_width: mask.width(),
        frame_height: mask.height(),
        zone,
        glyphs,
        unclassified,
    }
}

/// Captures one frame and runs the whole detection on it.
pub fn run_detection(
    source: &mut dyn FrameSource,
    config: &Config,
    observer: Option<&mut dyn DetectionObserver>,
) -> Result<DetectionResult, PipelineError> {
    let frame = source.capture_frame()?;
    let result = detect_frame(&frame, config);

    if result.is_empty() {
        info!("no glyphs detected");
    } else {
        let names: Vec<&str> = result.glyphs.iter().map(|g| g.direction.as_str()).collect();
        info!(
            count = result.glyphs.len(),
            dropped = result.unclassified.len(),
            "detected: {}",
            names.join(" ")
        );
    }

    if let Some(observer) = observer {
        observer.on_detection(&frame, &result);
    }
    Ok(result)
}

/// Admits one activation at a time; a second one while the first is running
/// is rejected.
#[derive(Debug, Clone, Default)]
pub struct ActivationGate {
    busy: Arc<AtomicBool>,
}

pub struct ActivationGuard {
    busy: Arc<AtomicBool>,
}

impl ActivationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Result<ActivationGuard, PipelineError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PipelineError::Busy)?;
        Ok(ActivationGuard {
            busy: Arc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

pub const LOCK_FILE: &str = "hud-arrows.lock";

/// Exclusive lock on a file, so activations started as separate processes
/// reject each other the same way [`ActivationGate`] does within one.
pub struct ActivationLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl ActivationLock {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let path = path.into();
        let file = open_lock_file(&path).map_err(|source| PipelineError::Lock {
            path: path.clone(),
            source,
        })?;
        Ok(Self {
            path,
            lock: RwLock::new(file),
        })
    }

    /// Held until the returned guard is dropped.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, PipelineError> {
        let path = &self.path;
        self.lock.try_write().map_err(|source| {
            if source.kind() == io::ErrorKind::WouldBlock {
                PipelineError::Busy
            } else {
                PipelineError::Lock {
                    path: path.clone(),
                    source,
                }
            }
        })
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use crate::frame::StaticSource;
    use image::Rgb;
    use tempfile::tempdir;

    const WHITE: Rgb<u8> = Rgb([240, 240, 240]);

    /// 12x11, left half solid with a thin bar out to the right. 84 px.
    const LEFT_HEAVY: [&str; 11] = [
        "######......",
        "######......",
        "######......",
        "######......",
        "############",
        "############",
        "############",
        "######......",
        "######......",
        "######......",
        "######......",
    ];

    /// 11x12, bottom half solid with a thin stem up the middle. 84 px.
    const BOTTOM_HEAVY: [&str; 12] = [
        "....###....",
        "....###....",
        "....###....",
        "....###....",
        "....###....",
        "....###....",
        "###########",
        "###########",
        "###########",
        "###########",
        "###########",
        "###########",
    ];

    fn stamp(frame: &mut Frame, rows: &[&str], x0: u32, y0: u32, scale: u32) {
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch != '#' {
                    continue;
                }
                for sy in 0..scale {
                    for sx in 0..scale {
                        frame.put_pixel(
                            x0 + x as u32 * scale + sx,
                            y0 + y as u32 * scale + sy,
                            WHITE,
                        );
                    }
                }
            }
        }
    }

    struct Failing;

    impl FrameSource for Failing {
        fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
            Err(CaptureError::NoMonitor)
        }
    }

    #[derive(Default)]
    struct Seen(Vec<Vec<Direction>>);

    impl DetectionObserver for Seen {
        fn on_detection(&mut self, _frame: &Frame, result: &DetectionResult) {
            self.0.push(result.directions());
        }
    }

    #[test]
    fn reads_glyphs_left_to_right_at_reference_resolution() {
        let mut frame = Frame::new(1920, 1080);
        // One row higher, so the right glyph is discovered first.
        stamp(&mut frame, &BOTTOM_HEAVY, 295, 925, 1);
        stamp(&mut frame, &LEFT_HEAVY, 94, 926, 1);

        let mut source = StaticSource::new(frame);
        let result = run_detection(&mut source, &Config::default(), None).unwrap();

        assert_eq!(result.directions(), vec![Direction::Left, Direction::Down]);
        let centers: Vec<u32> = result.glyphs.iter().map(|g| g.region.center_x()).collect();
        assert_eq!(centers, vec![100, 300]);
        assert_eq!(result.glyphs[0].region.area, 84);
        assert!(result.unclassified.is_empty());
    }

    #[test]
    fn scaled_glyphs_survive_at_double_resolution() {
        let mut frame = Frame::new(3840, 2160);
        stamp(&mut frame, &LEFT_HEAVY, 188, 1852, 2);
        stamp(&mut frame, &BOTTOM_HEAVY, 590, 1852, 2);

        let result = detect_frame(&frame, &Config::default());
        assert_eq!(result.zone.area_min, 320);
        assert_eq!(result.zone.area_max, 560);
        assert_eq!(result.directions(), vec![Direction::Left, Direction::Down]);
        assert_eq!(result.glyphs[0].region.area, 336);
    }

    #[test]
    fn glyphs_outside_the_band_are_ignored() {
        let mut frame = Frame::new(1920, 1080);
        stamp(&mut frame, &LEFT_HEAVY, 94, 1020, 1);
        stamp(&mut frame, &LEFT_HEAVY, 400, 100, 1);

        let result = detect_frame(&frame, &Config::default());
        assert!(result.is_empty());
    }

    #[test]
    fn black_frame_is_empty_detection_not_error() {
        let mut source = StaticSource::new(Frame::new(1920, 1080));
        let result = run_detection(&mut source, &Config::default(), None).unwrap();
        assert!(result.is_empty());
        assert!(result.directions().is_empty());
    }

    #[test]
    fn unclassifiable_regions_are_dropped_not_fatal() {
        let mask = Mask::from_rows(&[
            "........", //
            ".##.###.",
            ".##.###.",
            ".##.###.",
            "........",
        ]);
        let zone = Zone {
            y_start: 0,
            y_end: 10,
            area_min: 1,
            area_max: 100,
        };
        let result = detect_mask(&mask, zone, &Config::default());
        assert_eq!(result.unclassified.len(), 1);
        assert_eq!(result.unclassified[0].width, 2);
        assert_eq!(result.glyphs.len(), 1);
        assert!(!result.is_empty());
    }

    #[test]
    fn capture_failure_propagates() {
        let err = run_detection(&mut Failing, &Config::default(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Capture(CaptureError::NoMonitor)));
    }

    #[test]
    fn observer_receives_final_result() {
        let mut frame = Frame::new(1920, 1080);
        stamp(&mut frame, &LEFT_HEAVY, 94, 926, 1);
        let mut seen = Seen::default();
        let mut source = StaticSource::new(frame);
        run_detection(&mut source, &Config::default(), Some(&mut seen)).unwrap();
        assert_eq!(seen.0, vec![vec![Direction::Left]]);
    }

    #[test]
    fn gate_rejects_second_activation_until_released() {
        let gate = ActivationGate::new();
        let guard = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(matches!(gate.clone().try_acquire(), Err(PipelineError::Busy)));
        drop(guard);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_ok());
    }

    #[test]
    fn file_lock_rejects_second_holder_until_released() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run").join(LOCK_FILE);
        let mut first = ActivationLock::open(&path).unwrap();
        let mut second = ActivationLock::open(&path).unwrap();

        let guard = first.try_acquire().unwrap();
        assert!(matches!(second.try_acquire(), Err(PipelineError::Busy)));
        drop(guard);
        assert!(second.try_acquire().is_ok());
    }
}
