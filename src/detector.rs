use crate::types::{LandmarkSet, VideoFrame};
use log::info;
use serde::{Deserialize, Serialize};

/// Hand-landmark detector settings, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// false = video stream: track between frames instead of re-detecting.
    pub static_image_mode: bool,
    pub max_num_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            static_image_mode: false,
            max_num_hands: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Finds at most one hand in an RGB frame.
///
/// `None` means "no hand this frame" and is the normal idle state, not an
/// error. Implementations hold their own tracking state, hence `&mut self`.
pub trait HandDetector: Send {
    /// Called once by the perception loop before the first frame.
    fn configure(&mut self, config: &DetectorConfig);

    fn detect(&mut self, rgb: &VideoFrame) -> Option<LandmarkSet>;
}

/// Detector for builds without a landmark model: the camera preview runs and
/// every frame reports no hand, so no keys go down.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHand;

impl HandDetector for NoHand {
    fn configure(&mut self, config: &DetectorConfig) {
        info!("No landmark model linked in; hand tracking disabled ({:?})", config);
    }

    fn detect(&mut self, _rgb: &VideoFrame) -> Option<LandmarkSet> {
        None
    }
}
