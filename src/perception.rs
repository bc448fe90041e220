use crate::camera::{Camera, CameraOpener};
use crate::detector::{DetectorConfig, HandDetector};
use crate::key_mapper::map_keys;
use crate::lifecycle::RunFlag;
use crate::note_bank::{NoteBank, NoteTrigger};
use crate::overlay::draw_landmarks;
use crate::presentation::{CaptureStatus, Presentation};
use crate::types::*;
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Pause after a failed frame read so a dead device doesn't pin a core.
const READ_RETRY_BACKOFF: Duration = Duration::from_millis(5);
/// Consecutive read failures between warnings.
const READ_FAILURE_WARN_EVERY: u64 = 100;

/// The previous iteration's key set, kept only to find rising edges.
#[derive(Debug, Default, Clone, Copy)]
pub struct PressHistory {
    last: KeySet,
}

impl PressHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `current` and return the keys that were not pressed last time.
    /// Releases are not events.
    pub fn advance(&mut self, current: KeySet) -> KeySet {
        let new = current.difference(self.last);
        self.last = current;
        new
    }

    pub fn last(&self) -> KeySet {
        self.last
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Opening,
    Running,
    Stopped,
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    CameraNotFound,
    Finished { frames: u64, notes: u64 },
}

/// Capture settings the loop applies once the camera is open.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub draw_overlay: bool,
    pub detector: DetectorConfig,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: CAPTURE_WIDTH,
            height: CAPTURE_HEIGHT,
            draw_overlay: true,
            detector: DetectorConfig::default(),
        }
    }
}

/// The producer: camera → detector → keys → notes → presentation.
///
/// Runs on its own thread until the run flag clears. Owns the camera from
/// open to release; nothing it does can fail across the thread boundary.
/// The UI hears about it only through `Presentation`.
pub struct PerceptionLoop {
    opener: Option<CameraOpener>,
    settings: CaptureSettings,
    detector: Box<dyn HandDetector>,
    layout: KeyLayout,
    notes: Arc<NoteBank>,
    trigger: Box<dyn NoteTrigger>,
    presentation: Arc<Presentation>,
    run: RunFlag,
    history: PressHistory,
    frames: u64,
    notes_played: u64,
}

impl PerceptionLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opener: CameraOpener,
        settings: CaptureSettings,
        detector: Box<dyn HandDetector>,
        layout: KeyLayout,
        notes: Arc<NoteBank>,
        trigger: Box<dyn NoteTrigger>,
        presentation: Arc<Presentation>,
        run: RunFlag,
    ) -> Self {
        Self {
            opener: Some(opener),
            settings,
            detector,
            layout,
            notes,
            trigger,
            presentation,
            run,
            history: PressHistory::new(),
            frames: 0,
            notes_played: 0,
        }
    }

    pub fn run_flag(&self) -> RunFlag {
        self.run.clone()
    }

    /// Drive the loop to completion. Blocks the calling thread.
    pub fn run(mut self) -> LoopOutcome {
        self.detector.configure(&self.settings.detector);

        let mut state = LoopState::Opening;
        let mut camera: Option<Box<dyn Camera>> = None;
        let mut prev_t = Instant::now();
        let mut read_failures: u64 = 0;

        loop {
            state = match state {
                LoopState::Opening => match self.open_camera() {
                    Some(cam) => {
                        camera = Some(cam);
                        prev_t = Instant::now();
                        LoopState::Running
                    }
                    None => LoopState::Stopped,
                },

                LoopState::Running => {
                    if !self.run.is_running() {
                        LoopState::Stopped
                    } else {
                        if let Some(cam) = camera.as_mut() {
                            match cam.read_frame() {
                                Ok(frame) => {
                                    if read_failures >= READ_FAILURE_WARN_EVERY {
                                        info!("Camera recovered after {} failed reads", read_failures);
                                    }
                                    read_failures = 0;
                                    self.process(frame, &mut prev_t);
                                }
                                Err(e) => {
                                    read_failures += 1;
                                    if read_failures % READ_FAILURE_WARN_EVERY == 0 {
                                        warn!("{} consecutive frame read failures: {}", read_failures, e);
                                    } else {
                                        trace!("Frame skipped: {}", e);
                                    }
                                    thread::sleep(READ_RETRY_BACKOFF);
                                }
                            }
                        }
                        LoopState::Running
                    }
                }

                LoopState::Stopped => break,
            };
        }

        match camera.take() {
            Some(mut cam) => {
                cam.release();
                self.presentation.set_status(CaptureStatus::Stopped);
                info!(
                    "Perception loop stopped after {} frames, {} notes",
                    self.frames, self.notes_played
                );
                LoopOutcome::Finished {
                    frames: self.frames,
                    notes: self.notes_played,
                }
            }
            None => LoopOutcome::CameraNotFound,
        }
    }

    fn open_camera(&mut self) -> Option<Box<dyn Camera>> {
        let opener = self.opener.take()?;
        let index = self.settings.device_index;
        info!("Opening camera {}", index);
        match opener(index) {
            Ok(mut cam) => {
                let (w, h) = (self.settings.width, self.settings.height);
                if let Err(e) = cam.configure(w, h) {
                    warn!("{}; continuing at device default size", e);
                }
                let name = cam.name();
                info!("Capturing from {}", name);
                self.presentation
                    .set_status(CaptureStatus::Running { camera: name });
                Some(cam)
            }
            Err(e) => {
                error!("Camera not found: {}", e);
                self.presentation
                    .set_status(CaptureStatus::CameraNotFound(e.to_string()));
                None
            }
        }
    }

    /// One successful read: everything from mirroring to publishing.
    fn process(&mut self, mut frame: VideoFrame, prev_t: &mut Instant) {
        frame.mirror_horizontal();
        let mut rgb = frame.into_rgb();

        let landmarks = self.detector.detect(&rgb);
        let pressed = map_keys(&self.layout, landmarks.as_ref());

        let new_keys = self.history.advance(pressed);
        for key in new_keys.iter() {
            debug!("Key down: {}", key);
            self.trigger.trigger(self.notes.get(key));
            self.notes_played += 1;
        }

        if self.settings.draw_overlay {
            if let Some(lm) = landmarks.as_ref() {
                draw_landmarks(&mut rgb, lm);
            }
        }

        let now = Instant::now();
        let fps = 1.0 / (now.duration_since(*prev_t).as_secs_f64() + FPS_EPSILON);
        *prev_t = now;

        self.presentation.publish(rgb, pressed, fps);

        self.frames += 1;
        if self.frames % 300 == 0 {
            debug!("Perception: {} frames processed, {:.1} fps", self.frames, fps);
        }
        trace!("keys=[{}] fps={:.1}", pressed, fps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;
    use crate::note_bank::AudioBuffer;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    fn keys(ks: &[Key]) -> KeySet {
        ks.iter().copied().collect()
    }

    #[test]
    fn test_first_press_from_empty_history() {
        let mut h = PressHistory::new();
        assert_eq!(h.advance(keys(&[Key::C])), keys(&[Key::C]));
    }

    #[test]
    fn test_added_key_is_the_only_edge() {
        let mut h = PressHistory::new();
        h.advance(keys(&[Key::C]));
        assert_eq!(h.advance(keys(&[Key::C, Key::D])), keys(&[Key::D]));
    }

    #[test]
    fn test_held_key_is_not_an_edge() {
        let mut h = PressHistory::new();
        h.advance(keys(&[Key::C]));
        assert!(h.advance(keys(&[Key::C])).is_empty());
    }

    #[test]
    fn test_release_is_not_an_edge() {
        let mut h = PressHistory::new();
        h.advance(keys(&[Key::C, Key::D]));
        assert!(h.advance(keys(&[Key::D])).is_empty());
        assert_eq!(h.last(), keys(&[Key::D]));
    }

    #[test]
    fn test_third_key_edge() {
        let mut h = PressHistory::new();
        h.advance(keys(&[Key::C, Key::D]));
        assert_eq!(h.advance(keys(&[Key::C, Key::D, Key::E])), keys(&[Key::E]));
    }

    #[test]
    fn test_repress_after_release_is_an_edge() {
        let mut h = PressHistory::new();
        h.advance(keys(&[Key::G]));
        h.advance(KeySet::EMPTY);
        assert_eq!(h.advance(keys(&[Key::G])), keys(&[Key::G]));
    }

    // ─── Loop harness ──────────────────────────────────────────────────────

    /// Camera that replays a fixed list of reads, then stops the run flag.
    struct ScriptedCamera {
        reads: VecDeque<Result<VideoFrame, CameraError>>,
        run: RunFlag,
        released: Arc<Mutex<bool>>,
    }

    impl Camera for ScriptedCamera {
        fn name(&self) -> String {
            "scripted".into()
        }
        fn configure(&mut self, _w: u32, _h: u32) -> Result<(), CameraError> {
            Ok(())
        }
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            let next = self.reads.pop_front();
            if self.reads.is_empty() {
                self.run.stop();
            }
            next.unwrap_or_else(|| Err(CameraError::Read("exhausted".into())))
        }
        fn release(&mut self) {
            *self.released.lock() = true;
        }
    }

    /// Detector that returns one scripted key pose per call.
    struct PoseDetector {
        poses: VecDeque<Option<KeySet>>,
        seen_formats: Arc<Mutex<Vec<PixelFormat>>>,
        configured: Arc<Mutex<Vec<DetectorConfig>>>,
    }

    impl HandDetector for PoseDetector {
        fn configure(&mut self, config: &DetectorConfig) {
            self.configured.lock().push(*config);
        }

        fn detect(&mut self, rgb: &VideoFrame) -> Option<LandmarkSet> {
            self.seen_formats.lock().push(rgb.format);
            let pose = self.poses.pop_front().flatten()?;
            let mut points = vec![Landmark::new(0.5, 0.3); HAND_LANDMARKS];
            points[WRIST] = Landmark::new(0.5, 0.5);
            for key in pose.iter() {
                points[FINGER_TIPS[key.index()]].y = 0.8;
            }
            Some(LandmarkSet::new(points))
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Key>>>);

    impl NoteTrigger for Recorder {
        fn trigger(&self, buffer: &Arc<AudioBuffer>) {
            self.0.lock().push(buffer.key);
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::filled(4, 2, PixelFormat::Bgr, [1, 2, 3])
    }

    fn build(
        reads: Vec<Result<VideoFrame, CameraError>>,
        poses: Vec<Option<KeySet>>,
    ) -> (PerceptionLoop, Recorder, Arc<Presentation>, Arc<Mutex<bool>>, Arc<Mutex<Vec<PixelFormat>>>) {
        let run = RunFlag::new();
        let released = Arc::new(Mutex::new(false));
        let cam = ScriptedCamera {
            reads: reads.into(),
            run: run.clone(),
            released: released.clone(),
        };
        let opener: CameraOpener = Box::new(move |_| Ok(Box::new(cam) as Box<dyn Camera>));
        let formats = Arc::new(Mutex::new(Vec::new()));
        let detector = PoseDetector {
            poses: poses.into(),
            seen_formats: formats.clone(),
            configured: Arc::default(),
        };
        let layout = KeyLayout::default();
        let notes = Arc::new(NoteBank::new(&layout, 0.01, 8_000));
        let recorder = Recorder::default();
        let presentation = Arc::new(Presentation::new());
        let lp = PerceptionLoop::new(
            opener,
            CaptureSettings::default(),
            Box::new(detector),
            layout,
            notes,
            Box::new(recorder.clone()),
            presentation.clone(),
            run,
        );
        (lp, recorder, presentation, released, formats)
    }

    #[test]
    fn test_loop_triggers_only_rising_edges() {
        let poses = vec![
            Some(keys(&[Key::C])),
            Some(keys(&[Key::C, Key::D])),
            Some(keys(&[Key::C, Key::D])),
            Some(keys(&[Key::D])),
            None,
            Some(keys(&[Key::C, Key::G])),
        ];
        let reads = (0..poses.len()).map(|_| Ok(frame())).collect();
        let (lp, rec, pres, released, _) = build(reads, poses);

        let outcome = lp.run();
        assert_eq!(outcome, LoopOutcome::Finished { frames: 6, notes: 4 });
        assert_eq!(*rec.0.lock(), vec![Key::C, Key::D, Key::C, Key::G]);
        assert_eq!(pres.keys(), keys(&[Key::C, Key::G]));
        assert_eq!(pres.frame_seq(), 6);
        assert!(pres.fps() > 0.0 && pres.fps().is_finite());
        assert_eq!(pres.status(), CaptureStatus::Stopped);
        assert!(*released.lock(), "camera must be released on stop");
    }

    #[test]
    fn test_read_failures_are_skipped() {
        let reads = vec![
            Err(CameraError::Read("glitch".into())),
            Ok(frame()),
            Err(CameraError::Read("glitch".into())),
            Ok(frame()),
        ];
        let poses = vec![Some(keys(&[Key::E])), Some(keys(&[Key::E, Key::F]))];
        let (lp, rec, pres, _, _) = build(reads, poses);

        let outcome = lp.run();
        assert_eq!(outcome, LoopOutcome::Finished { frames: 2, notes: 2 });
        assert_eq!(*rec.0.lock(), vec![Key::E, Key::F]);
        assert_eq!(pres.frame_seq(), 2);
    }

    #[test]
    fn test_no_hand_publishes_empty_keys_and_plays_nothing() {
        let reads = vec![Ok(frame()), Ok(frame())];
        let (lp, rec, pres, _, _) = build(reads, vec![None, None]);
        lp.run();
        assert!(rec.0.lock().is_empty());
        assert!(pres.keys().is_empty());
        assert!(pres.snapshot().frame.is_some());
    }

    #[test]
    fn test_detector_sees_mirrored_rgb() {
        let f = VideoFrame::new(2, 1, PixelFormat::Bgr, vec![1, 2, 3, 4, 5, 6]);
        let (lp, _, pres, _, formats) = build(vec![Ok(f)], vec![None]);
        lp.run();
        assert_eq!(*formats.lock(), vec![PixelFormat::Rgb]);
        let shown = pres.snapshot().frame.unwrap();
        // mirrored: [4,5,6][1,2,3], then BGR→RGB: [6,5,4][3,2,1]
        assert_eq!(shown.data, vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_camera_open_failure_is_terminal() {
        let run = RunFlag::new();
        let layout = KeyLayout::default();
        let recorder = Recorder::default();
        let presentation = Arc::new(Presentation::new());
        let opener: CameraOpener = Box::new(|index| {
            Err(CameraError::NotFound {
                index,
                reason: "no such device".into(),
            })
        });
        let lp = PerceptionLoop::new(
            opener,
            CaptureSettings::default(),
            Box::new(PoseDetector {
                poses: VecDeque::new(),
                seen_formats: Arc::default(),
                configured: Arc::default(),
            }),
            layout.clone(),
            Arc::new(NoteBank::new(&layout, 0.01, 8_000)),
            Box::new(recorder.clone()),
            presentation.clone(),
            run.clone(),
        );

        assert_eq!(lp.run(), LoopOutcome::CameraNotFound);
        assert!(matches!(presentation.status(), CaptureStatus::CameraNotFound(_)));
        assert!(recorder.0.lock().is_empty());
        assert_eq!(presentation.frame_seq(), 0);
        // The flag is untouched; the UI decides when to close.
        assert!(run.is_running());
    }

    #[test]
    fn test_stopped_before_first_read() {
        let (lp, rec, pres, released, _) = build(vec![Ok(frame())], vec![Some(keys(&[Key::C]))]);
        lp.run_flag().stop();
        assert_eq!(lp.run(), LoopOutcome::Finished { frames: 0, notes: 0 });
        assert!(rec.0.lock().is_empty());
        assert_eq!(pres.frame_seq(), 0);
        assert!(*released.lock());
    }

    #[test]
    fn test_detector_configured_once_before_first_frame() {
        let run = RunFlag::new();
        let layout = KeyLayout::default();
        let configured = Arc::new(Mutex::new(Vec::new()));
        let formats = Arc::new(Mutex::new(Vec::new()));
        let cam = ScriptedCamera {
            reads: vec![Ok(frame()), Ok(frame())].into(),
            run: run.clone(),
            released: Arc::default(),
        };
        let opener: CameraOpener = Box::new(move |_| Ok(Box::new(cam) as Box<dyn Camera>));
        let tuned = DetectorConfig {
            min_detection_confidence: 0.9,
            min_tracking_confidence: 0.25,
            ..DetectorConfig::default()
        };
        let lp = PerceptionLoop::new(
            opener,
            CaptureSettings {
                detector: tuned,
                ..CaptureSettings::default()
            },
            Box::new(PoseDetector {
                poses: VecDeque::new(),
                seen_formats: formats.clone(),
                configured: configured.clone(),
            }),
            layout.clone(),
            Arc::new(NoteBank::new(&layout, 0.01, 8_000)),
            Box::new(Recorder::default()),
            Arc::new(Presentation::new()),
            run,
        );

        assert_eq!(lp.run(), LoopOutcome::Finished { frames: 2, notes: 0 });
        assert_eq!(*configured.lock(), vec![tuned]);
        assert_eq!(formats.lock().len(), 2);
    }
}
