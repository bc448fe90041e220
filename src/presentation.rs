//! The one handoff point between the perception thread and the UI.
//!
//! Each field is replaced as a unit: the frame is swapped as an `Arc`, the
//! key set is a single atomic byte, fps a single atomic word. A reader may
//! see a frame from one iteration next to keys from the next; it never sees a
//! half-written field.

use crate::types::{KeySet, VideoFrame};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// What the capture side is doing, as far as the UI needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Initializing,
    Running { camera: String },
    CameraNotFound(String),
    Stopped,
}

pub struct Presentation {
    frame: Mutex<Option<Arc<VideoFrame>>>,
    keys: AtomicU8,
    fps_bits: AtomicU64,
    /// Incremented on every publish; lets the UI skip re-uploading old frames.
    frame_seq: AtomicU64,
    status: Mutex<CaptureStatus>,
}

/// A reader's copy of the latest published state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: Option<Arc<VideoFrame>>,
    pub frame_seq: u64,
    pub keys: KeySet,
    pub fps: f64,
    pub status: CaptureStatus,
}

impl Presentation {
    pub fn new() -> Self {
        Self {
            frame: Mutex::new(None),
            keys: AtomicU8::new(0),
            fps_bits: AtomicU64::new(0f64.to_bits()),
            frame_seq: AtomicU64::new(0),
            status: Mutex::new(CaptureStatus::Initializing),
        }
    }

    /// Replace frame, keys and fps. Called once per perception iteration.
    pub fn publish(&self, frame: VideoFrame, keys: KeySet, fps: f64) {
        *self.frame.lock() = Some(Arc::new(frame));
        self.frame_seq.fetch_add(1, Ordering::Release);
        self.keys.store(keys.bits(), Ordering::Release);
        self.fps_bits.store(fps.to_bits(), Ordering::Release);
    }

    pub fn set_status(&self, status: CaptureStatus) {
        *self.status.lock() = status;
    }

    pub fn status(&self) -> CaptureStatus {
        self.status.lock().clone()
    }

    pub fn keys(&self) -> KeySet {
        KeySet::from_bits(self.keys.load(Ordering::Acquire))
    }

    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Acquire))
    }

    pub fn frame_seq(&self) -> u64 {
        self.frame_seq.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Snapshot {
        let frame = self.frame.lock().clone();
        Snapshot {
            frame,
            frame_seq: self.frame_seq(),
            keys: self.keys(),
            fps: self.fps(),
            status: self.status(),
        }
    }
}

impl Default for Presentation {
    fn default() -> Self {
        Self::new()
    }
}
