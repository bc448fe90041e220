use crate::lifecycle::RunFlag;
use crate::presentation::{CaptureStatus, Presentation, Snapshot};
use crate::types::*;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Headless stand-in for the window: redraws the key panel and fps on one
/// terminal line at a fixed rate until the run flag clears.
pub struct ConsoleDisplay {
    presentation: Arc<Presentation>,
    run: RunFlag,
    interval: Duration,
}

impl ConsoleDisplay {
    pub fn new(presentation: Arc<Presentation>, run: RunFlag, update_hz: u32) -> Self {
        let interval = if update_hz == 0 {
            Duration::from_millis(REFRESH_INTERVAL_MS)
        } else {
            Duration::from_micros(1_000_000 / update_hz as u64)
        };
        Self {
            presentation,
            run,
            interval,
        }
    }

    /// Tick until stopped. Blocks the calling thread.
    pub fn run(&self) {
        let mut stdout = io::stdout();
        let mut next = Instant::now();
        let mut last_status = None;

        while self.run.is_running() {
            let snap = self.presentation.snapshot();

            // Status changes get their own line so they stay in scrollback.
            if last_status.as_ref() != Some(&snap.status) {
                println!();
                println!("  {}", status_line(&snap.status));
                last_status = Some(snap.status.clone());
            }

            print!("\r{}", render_panel(&snap));
            let _ = stdout.flush();

            next += self.interval;
            let now = Instant::now();
            if next > now {
                thread::sleep(next - now);
            } else {
                next = now;
            }
        }
        println!();
    }
}

fn status_line(status: &CaptureStatus) -> String {
    match status {
        CaptureStatus::Initializing => "Initializing camera…".to_string(),
        CaptureStatus::Running { camera } => format!("Capturing from {}", camera),
        CaptureStatus::CameraNotFound(reason) => format!("❌ Camera not found ({})", reason),
        CaptureStatus::Stopped => "Capture stopped".to_string(),
    }
}

/// `║ C ║ D ║█E█║ F ║ G ║  FPS: 29.8`
pub fn render_panel(snap: &Snapshot) -> String {
    let mut line = String::from("║");
    for key in Key::ALL {
        if snap.keys.contains(key) {
            line.push_str(&format!("█{}█║", key));
        } else {
            line.push_str(&format!(" {} ║", key));
        }
    }
    line.push_str(&format!("  FPS: {:.1}   ", snap.fps));
    line
}
