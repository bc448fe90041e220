use hand_piano::camera::CameraOpener;
use hand_piano::config::InstrumentConfig;
use hand_piano::console_display::ConsoleDisplay;
use hand_piano::lifecycle::{Lifecycle, RunFlag};
use hand_piano::note_bank::{NoteBank, NoteTrigger, SilentTrigger};
use hand_piano::perception::{CaptureSettings, LoopOutcome, PerceptionLoop};
use hand_piano::presentation::Presentation;
use hand_piano::simulator::{hand_source, SyntheticCamera};
use hand_piano::types::*;
#[cfg(feature = "audio")]
use hand_piano::audio_out;
#[cfg(feature = "camera")]
use hand_piano::camera::DeviceCamera;
#[cfg(feature = "gui")]
use hand_piano::gui;

use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hand-piano")]
#[command(about = "Five-key webcam piano played by curling your fingers")]
struct Cli {
    /// Run with a synthetic camera and a scripted hand (no webcam required)
    #[arg(long)]
    simulate: bool,

    /// Camera device index
    #[arg(long, default_value_t = 0)]
    device: u32,

    /// Instrument config (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable the native GUI window and draw the keys in the terminal
    #[arg(long)]
    no_gui: bool,

    /// Console display refresh rate (Hz)
    #[arg(long, default_value_t = 20)]
    display_hz: u32,

    /// Do not open an audio device
    #[arg(long)]
    mute: bool,

    /// Do not draw the hand skeleton on the video
    #[arg(long)]
    no_overlay: bool,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();
    let clock = SessionClock::new();

    let cfg = match &cli.config {
        Some(path) => match InstrumentConfig::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("Bad config {:?}: {}", path, e);
                process::exit(1);
            }
        },
        None => InstrumentConfig::default(),
    };

    let gui_enabled = cfg!(feature = "gui") && !cli.no_gui;
    // Without a camera backend the synthetic camera stands in, and its hand with it.
    let simulate = cli.simulate || !cfg!(feature = "camera");

    info!("═══════════════════════════════════════════════");
    info!("  HAND PIANO v{}", env!("CARGO_PKG_VERSION"));
    info!("  Mode: {}", if simulate { "SIMULATOR" } else { "CAMERA (hand tracking off)" });
    info!("  Keys: {}", cfg.layout().iter().map(|(k, b)| format!("{}={:.2}Hz", k, b.frequency_hz)).collect::<Vec<_>>().join(" "));
    info!("  UI: {}", if gui_enabled { "window" } else { "console" });
    info!("═══════════════════════════════════════════════");

    // ─── Notes ──────────────────────────────────────────────────────
    let layout = cfg.layout();
    let notes = Arc::new(NoteBank::new(&layout, cfg.note_duration_secs, cfg.sample_rate));

    // ─── Audio out ──────────────────────────────────────────────────
    // The cpal stream is not Send; it stays here while the handle travels.
    #[cfg(feature = "audio")]
    let mut _player = None;
    let trigger: Box<dyn NoteTrigger> = if cli.mute {
        info!("Sound muted");
        Box::new(SilentTrigger)
    } else {
        #[cfg(feature = "audio")]
        {
            match audio_out::CpalPlayer::start() {
                Ok((player, handle)) => {
                    _player = Some(player);
                    Box::new(handle)
                }
                Err(e) => {
                    error!("Audio unavailable, continuing silent: {}", e);
                    Box::new(SilentTrigger)
                }
            }
        }
        #[cfg(not(feature = "audio"))]
        {
            warn!("Built without 'audio' feature; continuing silent");
            Box::new(SilentTrigger)
        }
    };

    // ─── Camera + hand source ───────────────────────────────────────
    let opener: CameraOpener = if cli.simulate {
        info!("Starting synthetic camera...");
        SyntheticCamera::opener()
    } else {
        #[cfg(feature = "camera")]
        {
            info!("Opening camera {}...", cli.device);
            DeviceCamera::opener()
        }
        #[cfg(not(feature = "camera"))]
        {
            error!("Camera mode requires 'camera' feature. Falling back to simulator.");
            SyntheticCamera::opener()
        }
    };
    let detector = hand_source(simulate, clock);

    let settings = CaptureSettings {
        device_index: cli.device,
        width: cfg.capture_width,
        height: cfg.capture_height,
        draw_overlay: cfg.draw_overlay && !cli.no_overlay,
        detector: cfg.detector,
    };

    // ─── Perception ─────────────────────────────────────────────────
    let presentation = Arc::new(Presentation::new());
    let run = RunFlag::new();
    let perception = PerceptionLoop::new(
        opener,
        settings,
        detector,
        layout,
        notes,
        trigger,
        presentation.clone(),
        run.clone(),
    );
    let lifecycle = match Lifecycle::start(perception) {
        Ok(l) => l,
        Err(e) => {
            error!("Could not start perception thread: {}", e);
            process::exit(1);
        }
    };

    // ─── Ctrl+C ─────────────────────────────────────────────────────
    let close_grace = cfg.close_grace();
    {
        let run = run.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            info!("Interrupted; stopping capture");
            run.stop();
            thread::sleep(close_grace);
            process::exit(0);
        }) {
            warn!("Could not install Ctrl+C handler: {}", e);
        }
    }

    // ─── UI on main thread (blocks until close) ─────────────────────
    #[cfg(feature = "gui")]
    if gui_enabled {
        if let Err(e) = gui::run(presentation.clone(), run.clone(), cfg.refresh_interval(), close_grace) {
            error!("Window failed: {}", e);
        }
        run.stop();
    }

    if !gui_enabled {
        info!("Running headless. Press Ctrl+C to stop.");
        ConsoleDisplay::new(presentation, run.clone(), cli.display_hz).run();
    }

    match lifecycle.join(close_grace + Duration::from_secs(1)) {
        Some(LoopOutcome::Finished { frames, notes }) => {
            info!("Stopped after {} frames, {} notes", frames, notes)
        }
        Some(LoopOutcome::CameraNotFound) => info!("Stopped (no camera)"),
        None => warn!("Exiting with perception thread still running"),
    }
}
