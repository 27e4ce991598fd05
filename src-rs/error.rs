use std::path::PathBuf;

use thiserror::Error;

use crate::classifier::Direction;

/// Frame acquisition failed. Fatal for the current activation.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no monitors found")]
    NoMonitor,
    #[error("screen capture failed: {0}")]
    Backend(String),
    #[error("failed to open image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("captured frame is empty ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

/// A single key event could not be delivered to the OS input queue.
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("failed to initialize keyboard backend: {0}")]
    Init(String),
    #[error("key down {0} failed: {1}")]
    KeyDown(Direction, String),
    #[error("key up {0} failed: {1}")]
    KeyUp(Direction, String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("a detection is already in progress")]
    Busy,
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
