use crate::types::{Key, KeyLayout};
use log::{debug, info};
use std::f64::consts::PI;
use std::sync::Arc;

/// Peak level of the generated sine, as a fraction of full scale.
const AMPLITUDE: f64 = 0.5;
/// Full-scale value for 16-bit PCM.
const MAX_AMPLITUDE: f64 = i16::MAX as f64;

/// One precomputed note: mono 16-bit PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub key: Key,
    pub frequency_hz: f64,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Quantized sine wave of `duration_secs` at `frequency_hz`.
pub fn synthesize(key: Key, frequency_hz: f64, duration_secs: f64, sample_rate: u32) -> AudioBuffer {
    let n = (duration_secs * sample_rate as f64).floor().max(0.0) as usize;
    let samples = (0..n)
        .map(|i| {
            let s = AMPLITUDE * (2.0 * PI * frequency_hz * i as f64 / sample_rate as f64).sin();
            (s.clamp(-1.0, 1.0) * MAX_AMPLITUDE).round() as i16
        })
        .collect();
    AudioBuffer {
        key,
        frequency_hz,
        sample_rate,
        samples,
    }
}

/// All note buffers, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct NoteBank {
    buffers: [Arc<AudioBuffer>; 5],
}

impl NoteBank {
    pub fn new(layout: &KeyLayout, duration_secs: f64, sample_rate: u32) -> Self {
        let buffers = Key::ALL.map(|key| {
            let hz = layout.binding(key).frequency_hz;
            debug!("Synthesizing {} at {:.2} Hz", key, hz);
            Arc::new(synthesize(key, hz, duration_secs, sample_rate))
        });
        info!(
            "Note bank ready: {} notes, {:.2}s @ {} Hz",
            buffers.len(),
            duration_secs,
            sample_rate
        );
        Self { buffers }
    }

    pub fn get(&self, key: Key) -> &Arc<AudioBuffer> {
        &self.buffers[key.index()]
    }
}

/// Fire-and-forget note playback. Implementations must accept overlapping
/// calls; a trigger never waits for or cuts off earlier notes.
pub trait NoteTrigger: Send {
    fn trigger(&self, buffer: &Arc<AudioBuffer>);
}

/// Discards every note. Used when sound is muted or unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentTrigger;

impl NoteTrigger for SilentTrigger {
    fn trigger(&self, buffer: &Arc<AudioBuffer>) {
        debug!("(muted) {}", buffer.key);
    }
}
