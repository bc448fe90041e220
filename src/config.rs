//! Instrument configuration: key table, note synthesis, capture and UI
//! timing. Every field has a default, so an empty JSON object is a valid file
//! and running without `--config` gives the stock five-key instrument.

use crate::detector::DetectorConfig;
use crate::error::ConfigError;
use crate::types::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Bindings for C, D, E, F, G in that order.
    pub keys: [KeyBinding; 5],
    pub note_duration_secs: f64,
    pub sample_rate: u32,
    pub capture_width: u32,
    pub capture_height: u32,
    pub refresh_interval_ms: u64,
    pub close_grace_ms: u64,
    pub draw_overlay: bool,
    pub detector: DetectorConfig,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        let layout = KeyLayout::default();
        Self {
            keys: Key::ALL.map(|k| layout.binding(k)),
            note_duration_secs: NOTE_DURATION_SECS,
            sample_rate: SAMPLE_RATE,
            capture_width: CAPTURE_WIDTH,
            capture_height: CAPTURE_HEIGHT,
            refresh_interval_ms: REFRESH_INTERVAL_MS,
            close_grace_ms: CLOSE_GRACE_MS,
            draw_overlay: true,
            detector: DetectorConfig::default(),
        }
    }
}

impl InstrumentConfig {
    /// Load and validate a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&data)?;
        cfg.validate()?;
        info!("Loaded instrument config from {:?}", path);
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, b) in Key::ALL.iter().zip(self.keys.iter()) {
            if !(b.frequency_hz.is_finite() && b.frequency_hz > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "key {} frequency must be positive, got {}",
                    key, b.frequency_hz
                )));
            }
            if b.fingertip == WRIST || b.fingertip >= HAND_LANDMARKS {
                return Err(ConfigError::Invalid(format!(
                    "key {} fingertip must be in 1..{}, got {}",
                    key, HAND_LANDMARKS, b.fingertip
                )));
            }
        }
        if !(self.note_duration_secs.is_finite() && self.note_duration_secs > 0.0) {
            return Err(ConfigError::Invalid("note_duration_secs must be positive".into()));
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be non-zero".into()));
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(ConfigError::Invalid("capture size must be non-zero".into()));
        }
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid("refresh_interval_ms must be non-zero".into()));
        }
        let d = &self.detector;
        if d.max_num_hands != 1 {
            return Err(ConfigError::Invalid("only one tracked hand is supported".into()));
        }
        for (name, v) in [
            ("min_detection_confidence", d.min_detection_confidence),
            ("min_tracking_confidence", d.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(ConfigError::Invalid(format!("{} must be in 0..=1, got {}", name, v)));
            }
        }
        Ok(())
    }

    pub fn layout(&self) -> KeyLayout {
        KeyLayout::new(self.keys)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }
}
