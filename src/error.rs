//! Error types for the capture, audio and configuration surfaces.
//!
//! None of these cross the perception thread boundary: the loop handles its
//! own failures and reports at most a `CaptureStatus` to the UI.

/// Camera failures.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    /// The device could not be opened. Fatal for the perception loop.
    #[error("camera {index} not found: {reason}")]
    NotFound { index: u32, reason: String },

    /// The device refused the requested capture size.
    #[error("failed to configure camera to {width}x{height}: {reason}")]
    Configure {
        width: u32,
        height: u32,
        reason: String,
    },

    /// A single frame could not be read. Transient.
    #[error("frame read failed: {0}")]
    Read(String),
}

/// Audio output failures.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no default audio output device found")]
    NoOutputDevice,

    #[error("unsupported output sample format {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Configuration file failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
