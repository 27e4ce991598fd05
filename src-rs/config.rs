use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunable constants for the whole pipeline. Every field has a default
/// calibrated against a 1920x1080 display, so an empty JSON object is a
/// valid config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segment: SegmentConfig,
    pub zone: ZoneCalibration,
    pub glyph: GlyphConfig,
    pub classifier: ClassifierConfig,
    pub sequencer: SequencerConfig,
    pub debug: DebugConfig,
}

/// Inclusive per-channel band a pixel must fall in to count as glyph ink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            lower: [220, 220, 220],
            upper: [255, 255, 255],
        }
    }
}

/// Reference layout the HUD band and glyph area bounds were measured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneCalibration {
    pub reference_width: u32,
    pub reference_height: u32,
    pub band_start_fraction: f64,
    pub band_end_fraction: f64,
    pub area_min_ref: u32,
    pub area_max_ref: u32,
}

impl Default for ZoneCalibration {
    fn default() -> Self {
        Self {
            reference_width: 1920,
            reference_height: 1080,
            // 920..950 px at 1080p
            band_start_fraction: 0.852,
            band_end_fraction: 0.880,
            area_min_ref: 80,
            area_max_ref: 140,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlyphConfig {
    pub aspect_min: f64,
    pub aspect_max: f64,
}

impl Default for GlyphConfig {
    fn default() -> Self {
        Self {
            aspect_min: 0.4,
            aspect_max: 2.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Glyphs narrower than this width/height ratio count as tall.
    pub tall_aspect_cutoff: f64,
    pub tall_vertical_weight: f64,
    pub vertical_weight: f64,
    pub min_side: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            tall_aspect_cutoff: 0.7,
            tall_vertical_weight: 2.0,
            vertical_weight: 1.1,
            min_side: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    pub hold_ms: u64,
    pub delay_ms: u64,
    /// Pause before capture so the activating hotkey is released first.
    pub start_delay_ms: u64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            hold_ms: 30,
            delay_ms: 10,
            start_delay_ms: 100,
        }
    }
}

impl SequencerConfig {
    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub overlay: bool,
    pub overlay_path: PathBuf,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            overlay: false,
            overlay_path: PathBuf::from("debug_arrows.png"),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segment;
        if seg.lower.iter().zip(seg.upper.iter()).any(|(lo, hi)| lo > hi) {
            return Err(ConfigError::Invalid(format!(
                "segment.lower {:?} exceeds segment.upper {:?}",
                seg.lower, seg.upper
            )));
        }

        let zone = &self.zone;
        if zone.reference_width == 0 || zone.reference_height == 0 {
            return Err(ConfigError::Invalid(
                "zone reference resolution must be non-zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&zone.band_start_fraction)
            || !(0.0..=1.0).contains(&zone.band_end_fraction)
            || zone.band_start_fraction >= zone.band_end_fraction
        {
            return Err(ConfigError::Invalid(format!(
                "zone band {}..{} must be an increasing range within 0..1",
                zone.band_start_fraction, zone.band_end_fraction
            )));
        }
        if zone.area_min_ref > zone.area_max_ref {
            return Err(ConfigError::Invalid(format!(
                "zone area range {}..{} is inverted",
                zone.area_min_ref, zone.area_max_ref
            )));
        }

        let glyph = &self.glyph;
        if !glyph.aspect_min.is_finite()
            || !glyph.aspect_max.is_finite()
            || glyph.aspect_min > glyph.aspect_max
            || glyph.aspect_min < 0.0
        {
            return Err(ConfigError::Invalid(format!(
                "glyph aspect range {}..{} is invalid",
                self.glyph.aspect_min, self.glyph.aspect_max
            )));
        }

        let classifier = &self.classifier;
        if classifier.min_side == 0 {
            return Err(ConfigError::Invalid(
                "classifier.min_side must be at least 1".to_string(),
            ));
        }
        if !(classifier.tall_aspect_cutoff.is_finite() && classifier.tall_aspect_cutoff > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "classifier.tall_aspect_cutoff {} must be positive",
                classifier.tall_aspect_cutoff
            )));
        }
        for (name, weight) in [
            ("tall_vertical_weight", classifier.tall_vertical_weight),
            ("vertical_weight", classifier.vertical_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "classifier.{name} {weight} must be a non-negative number"
                )));
            }
        }

        Ok(())
    }
}

/// Directory debug artifacts are written under.
pub fn out_root() -> PathBuf {
    env::var("HUD_ARROWS_OUT_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
