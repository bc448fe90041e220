use crate::perception::{LoopOutcome, PerceptionLoop};
use log::{info, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Process-wide "keep capturing" flag. Observed, never waited on.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for RunFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the perception thread.
pub struct Lifecycle {
    run: RunFlag,
    handle: Option<JoinHandle<LoopOutcome>>,
}

impl Lifecycle {
    /// Spawn the perception loop on its own thread.
    pub fn start(perception: PerceptionLoop) -> io::Result<Self> {
        let run = perception.run_flag();
        let handle = thread::Builder::new()
            .name("perception".into())
            .spawn(move || perception.run())?;
        info!("Perception thread started");
        Ok(Self {
            run,
            handle: Some(handle),
        })
    }

    pub fn request_stop(&self) {
        self.run.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the loop and wait up to `timeout` for it to release the camera.
    /// Returns `None` if the thread is still inside a blocking read.
    pub fn join(mut self, timeout: Duration) -> Option<LoopOutcome> {
        self.run.stop();
        let deadline = Instant::now() + timeout;
        while !self.is_finished() {
            if Instant::now() >= deadline {
                warn!("Perception thread still busy after {:?}; detaching", timeout);
                return None;
            }
            thread::sleep(Duration::from_millis(5));
        }
        self.handle.take().and_then(|h| h.join().ok())
    }
}

/// What the window should do with a close request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Cancel this close; the window closes itself when the grace ends.
    Defer,
    /// Let the window close.
    Allow,
}

/// Close-with-grace: the first request clears the run flag and holds the
/// window open for `grace` so the perception loop can release the camera.
#[derive(Debug)]
pub struct CloseGuard {
    run: RunFlag,
    grace: Duration,
    requested_at: Option<Instant>,
}

impl CloseGuard {
    pub fn new(run: RunFlag, grace: Duration) -> Self {
        Self {
            run,
            grace,
            requested_at: None,
        }
    }

    pub fn on_close_requested(&mut self, now: Instant) -> CloseAction {
        match self.requested_at {
            None => {
                info!("Close requested; stopping capture");
                self.run.stop();
                self.requested_at = Some(now);
                CloseAction::Defer
            }
            Some(_) if self.grace_elapsed(now) => CloseAction::Allow,
            Some(_) => CloseAction::Defer,
        }
    }

    pub fn is_closing(&self) -> bool {
        self.requested_at.is_some()
    }

    pub fn grace_elapsed(&self, now: Instant) -> bool {
        self.requested_at
            .map_or(false, |t| now.saturating_duration_since(t) >= self.grace)
    }
}
