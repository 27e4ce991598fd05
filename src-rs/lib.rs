//! Reads the strip of arrow glyphs in a game HUD off the screen and replays
//! it as arrow-key presses.
//!
//! One activation runs capture, segmentation, zone location, glyph finding
//! and classification ([`run_detection`]), then hands the left-to-right
//! direction list to the sequencer ([`execute`]).

pub mod classifier;
pub mod config;
pub mod error;
pub mod frame;
pub mod glyph;
pub mod logging;
pub mod mask;
pub mod overlay;
pub mod pipeline;
pub mod sequencer;
pub mod zone;

use std::time::Duration;

pub use crate::classifier::Direction;
pub use crate::config::Config;
pub use crate::error::{CaptureError, ConfigError, InjectionError, PipelineError};
pub use crate::frame::{Frame, FrameSource, ImageFileSource, ScreenSource};
pub use crate::pipeline::{
    run_detection, ActivationGate, ActivationLock, DetectionObserver, DetectionResult,
};
pub use crate::sequencer::{CancelToken, KeyInjector, SequenceReport, Timing};

/// Presses each direction for `hold`, waiting `inter_key_delay` between keys.
pub fn execute(
    sequence: &[Direction],
    hold: Duration,
    inter_key_delay: Duration,
    injector: &mut dyn KeyInjector,
) -> SequenceReport {
    let timing = Timing {
        hold,
        delay: inter_key_delay,
    };
    sequencer::execute(sequence, timing, injector, None)
}
