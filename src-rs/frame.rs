use std::path::PathBuf;

use image::{DynamicImage, RgbImage};
use tracing::{debug, info};

use crate::error::CaptureError;

/// One still of the display, three 8-bit channels per pixel.
pub type Frame = RgbImage;

/// Produces a fresh frame on demand. Implementations must fail loudly rather
/// than hand back an empty grid.
pub trait FrameSource {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError>;
}

/// Captures the first monitor reported by the platform.
#[derive(Debug, Default)]
pub struct ScreenSource;

impl FrameSource for ScreenSource {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let monitors = xcap::Monitor::all().map_err(|e| CaptureError::Backend(e.to_string()))?;
        let monitor = monitors.first().ok_or(CaptureError::NoMonitor)?;
        let rgba = monitor
            .capture_image()
            .map_err(|e| CaptureError::Backend(e.to_string()))?;
        let frame = DynamicImage::ImageRgba8(rgba).to_rgb8();
        ensure_non_empty(&frame)?;
        info!(width = frame.width(), height = frame.height(), "captured screen");
        Ok(frame)
    }
}

/// Reads a saved screenshot instead of the live display.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl FrameSource for ImageFileSource {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let frame = image::open(&self.path)
            .map_err(|source| CaptureError::Image {
                path: self.path.clone(),
                source,
            })?
            .to_rgb8();
        ensure_non_empty(&frame)?;
        debug!(path = %self.path.display(), width = frame.width(), height = frame.height(), "loaded frame from file");
        Ok(frame)
    }
}

/// Hands out a pre-built frame.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct StaticSource {
    frame: Frame,
}

#[cfg(test)]
impl StaticSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame }
    }
}

#[cfg(test)]
impl FrameSource for StaticSource {
    fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        ensure_non_empty(&self.frame)?;
        Ok(self.frame.clone())
    }
}

fn ensure_non_empty(frame: &Frame) -> Result<(), CaptureError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(CaptureError::EmptyFrame {
            width: frame.width(),
            height: frame.height(),
        });
    }
    Ok(())
}
