use crate::camera::{Camera, CameraOpener};
use crate::detector::{DetectorConfig, HandDetector, NoHand};
use crate::error::CameraError;
use crate::types::*;
use log::{debug, info};
use std::thread;
use std::time::{Duration, Instant};

/// Frame period of the synthetic camera (~30 fps).
const FRAME_PERIOD: Duration = Duration::from_micros(33_333);

/// Webcam stand-in: paces reads at ~30 fps and returns a slowly shifting
/// BGR gradient, so the whole pipeline (including colour conversion and
/// mirroring) runs without hardware.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_no: u64,
    next_frame_at: Instant,
    /// Fail every n-th read to exercise the transient path.
    dropout_every: Option<u64>,
    released: bool,
}

impl SyntheticCamera {
    pub fn new() -> Self {
        Self {
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            frame_no: 0,
            next_frame_at: Instant::now(),
            dropout_every: None,
            released: false,
        }
    }

    pub fn with_dropouts(mut self, every: u64) -> Self {
        self.dropout_every = (every > 0).then_some(every);
        self
    }

    /// `CameraOpener` that always succeeds.
    pub fn opener() -> CameraOpener {
        Box::new(|index| {
            info!("Synthetic camera standing in for device {}", index);
            Ok(Box::new(SyntheticCamera::new().with_dropouts(240)) as Box<dyn Camera>)
        })
    }

    fn render(&self) -> VideoFrame {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = (self.frame_no % 256) as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                let b = ((x * 255 / w.max(1)) + shift) % 256;
                let g = 40 + (y * 60 / h.max(1));
                data.extend_from_slice(&[b as u8, g as u8, 30]);
            }
        }
        VideoFrame::new(self.width, self.height, PixelFormat::Bgr, data)
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for SyntheticCamera {
    fn name(&self) -> String {
        format!("synthetic {}x{}", self.width, self.height)
    }

    fn configure(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
        if width == 0 || height == 0 {
            return Err(CameraError::Configure {
                width,
                height,
                reason: "zero-sized frame".into(),
            });
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.released {
            return Err(CameraError::Read("camera released".into()));
        }
        let now = Instant::now();
        if self.next_frame_at > now {
            thread::sleep(self.next_frame_at - now);
        }
        self.next_frame_at = Instant::now() + FRAME_PERIOD;
        self.frame_no += 1;

        if let Some(n) = self.dropout_every {
            if self.frame_no % n == 0 {
                return Err(CameraError::Read("simulated dropout".into()));
            }
        }
        Ok(self.render())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            info!("Synthetic camera released after {} frames", self.frame_no);
        }
    }
}

// ─── Scripted hand ──────────────────────────────────────────────────────────

/// One step of a scripted performance.
#[derive(Debug, Clone)]
pub enum Gesture {
    /// No hand in view.
    Away { ms: u32 },
    /// Open hand, every fingertip above the wrist.
    Rest { ms: u32 },
    /// Hold these fingers down.
    Press { keys: Vec<Key>, ms: u32 },
}

impl Gesture {
    fn ms(&self) -> u32 {
        match self {
            Gesture::Away { ms } | Gesture::Rest { ms } | Gesture::Press { ms, .. } => *ms,
        }
    }

    /// `None` = no hand.
    fn pose(&self) -> Option<KeySet> {
        match self {
            Gesture::Away { .. } => None,
            Gesture::Rest { .. } => Some(KeySet::EMPTY),
            Gesture::Press { keys, .. } => Some(keys.iter().copied().collect()),
        }
    }
}

/// Scale up, chords, a run back down, and a moment with the hand out of view.
pub fn demo_sequence() -> Vec<Gesture> {
    use Key::*;
    let mut seq = vec![Gesture::Away { ms: 800 }, Gesture::Rest { ms: 600 }];
    for k in Key::ALL {
        seq.push(Gesture::Press { keys: vec![k], ms: 300 });
        seq.push(Gesture::Rest { ms: 150 });
    }
    seq.extend([
        Gesture::Press { keys: vec![C, E, G], ms: 600 },
        Gesture::Rest { ms: 300 },
        Gesture::Press { keys: vec![D, F], ms: 400 },
        // add a finger while holding the others
        Gesture::Press { keys: vec![D, F, G], ms: 400 },
        Gesture::Rest { ms: 300 },
    ]);
    for k in Key::ALL.into_iter().rev() {
        seq.push(Gesture::Press { keys: vec![k], ms: 200 });
    }
    seq.push(Gesture::Away { ms: 600 });
    seq
}

/// Hand detector that plays back a gesture script against the wall clock,
/// looping forever.
pub struct ScriptedHand {
    script: Vec<Gesture>,
    clock: SessionClock,
    total_ms: u64,
}

impl ScriptedHand {
    pub fn new(script: Vec<Gesture>, clock: SessionClock) -> Self {
        let total_ms = script.iter().map(|g| g.ms() as u64).sum();
        info!(
            "Scripted hand: {} gestures, {:.1}s loop",
            script.len(),
            total_ms as f64 / 1000.0
        );
        Self {
            script,
            clock,
            total_ms,
        }
    }

    /// Pose at `t_ms` into the (looping) script.
    pub fn pose_at(&self, t_ms: u64) -> Option<KeySet> {
        if self.total_ms == 0 {
            return None;
        }
        let mut t = t_ms % self.total_ms;
        for g in &self.script {
            let ms = g.ms() as u64;
            if t < ms {
                return g.pose();
            }
            t -= ms;
        }
        None
    }
}

impl HandDetector for ScriptedHand {
    fn configure(&mut self, config: &DetectorConfig) {
        debug!("Scripted hand ignores detector thresholds {:?}", config);
    }

    fn detect(&mut self, _rgb: &VideoFrame) -> Option<LandmarkSet> {
        let t_ms = self.clock.now_us() / 1000;
        let pressed = self.pose_at(t_ms)?;
        // small sway so the overlay looks alive
        let sway = ((t_ms as f32 / 1000.0) * 1.3).sin() * 0.02;
        Some(hand_pose(pressed, sway))
    }
}

/// The hand source paired with each camera: the scripted performance for the
/// synthetic camera, nothing for a real one until a landmark model is linked.
pub fn hand_source(simulate: bool, clock: SessionClock) -> Box<dyn HandDetector> {
    if simulate {
        Box::new(ScriptedHand::new(demo_sequence(), clock))
    } else {
        Box::new(NoHand)
    }
}

/// A 21-point hand with the wrist at the bottom centre. Fingers in `pressed`
/// curl so their tips end up below the wrist.
pub fn hand_pose(pressed: KeySet, sway: f32) -> LandmarkSet {
    const WRIST_Y: f32 = 0.75;
    let mut points = vec![Landmark::default(); HAND_LANDMARKS];
    points[WRIST] = Landmark::new(0.5 + sway, WRIST_Y);

    for key in Key::ALL {
        let finger = key.index();
        let base_x = 0.38 + finger as f32 * 0.06 + sway;
        let down = pressed.contains(key);
        for joint in 1..=4usize {
            let idx = 1 + finger * 4 + (joint - 1);
            let y = if down {
                // knuckle up, then fold back past the wrist
                [0.62, 0.66, 0.76, 0.85][joint - 1]
            } else {
                0.62 - joint as f32 * 0.07
            };
            points[idx] = Landmark::new(base_x + (joint as f32 - 1.0) * 0.004, y);
        }
    }
    LandmarkSet::new(points)
}
