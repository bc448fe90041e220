use crate::note_bank::AudioBuffer;
use std::sync::Arc;

/// Upper bound on simultaneously sounding notes. Five fingers retriggering
/// 0.3 s notes at camera rate stay well below this.
pub const MAX_VOICES: usize = 64;

const I16_SCALE: f32 = 32768.0;

struct Voice {
    buffer: Arc<AudioBuffer>,
    /// Read position in source samples.
    pos: f64,
    /// Source samples advanced per output sample.
    step: f64,
}

/// Polyphonic voice mixer used inside the audio callback.
///
/// Every added buffer plays to its end; new notes never cut off old ones.
/// Buffers recorded at a different rate than the output are resampled with
/// linear interpolation.
pub struct Mixer {
    voices: Vec<Voice>,
    output_rate: u32,
}

impl Mixer {
    pub fn new(output_rate: u32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            output_rate,
        }
    }

    /// Start a voice. Returns false if the voice limit is reached and the
    /// note was dropped.
    pub fn add(&mut self, buffer: Arc<AudioBuffer>) -> bool {
        if self.voices.len() >= MAX_VOICES || buffer.samples.is_empty() {
            return false;
        }
        let step = buffer.sample_rate as f64 / self.output_rate.max(1) as f64;
        self.voices.push(Voice {
            buffer,
            pos: 0.0,
            step,
        });
        true
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Next mono output sample in -1.0..=1.0.
    pub fn next_sample(&mut self) -> f32 {
        let mut sum = 0.0f32;
        self.voices.retain_mut(|v| {
            let samples = &v.buffer.samples;
            let i = v.pos as usize;
            if i >= samples.len() {
                return false;
            }
            let frac = (v.pos - i as f64) as f32;
            let a = samples[i] as f32;
            let b = samples.get(i + 1).copied().unwrap_or(0) as f32;
            sum += (a + (b - a) * frac) / I16_SCALE;
            v.pos += v.step;
            true
        });
        sum.clamp(-1.0, 1.0)
    }

    /// Fill an interleaved buffer, writing the same sample to every channel.
    pub fn fill(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let s = self.next_sample();
            for ch in frame.iter_mut() {
                *ch = s;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;

    fn buf(samples: Vec<i16>, rate: u32) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer {
            key: Key::C,
            frequency_hz: 0.0,
            sample_rate: rate,
            samples,
        })
    }

    #[test]
    fn test_silence_without_voices() {
        let mut m = Mixer::new(44_100);
        assert_eq!(m.next_sample(), 0.0);
    }

    #[test]
    fn test_single_voice_plays_exactly_once() {
        let mut m = Mixer::new(100);
        m.add(buf(vec![16384, -16384, 8192], 100));
        assert_eq!(m.next_sample(), 0.5);
        assert_eq!(m.next_sample(), -0.5);
        assert_eq!(m.next_sample(), 0.25);
        assert_eq!(m.next_sample(), 0.0);
        assert_eq!(m.active_voices(), 0);
    }

    #[test]
    fn test_overlapping_voices_sum() {
        let mut m = Mixer::new(100);
        m.add(buf(vec![8192; 4], 100));
        m.next_sample();
        // Second note starts while the first is still sounding.
        m.add(buf(vec![4096; 4], 100));
        assert_eq!(m.active_voices(), 2);
        assert_eq!(m.next_sample(), 0.375);
        m.next_sample();
        m.next_sample();
        // First voice done, second still has one sample left.
        assert_eq!(m.next_sample(), 0.125);
        assert_eq!(m.next_sample(), 0.0);
        assert_eq!(m.active_voices(), 0);
    }

    #[test]
    fn test_sum_is_clamped() {
        let mut m = Mixer::new(100);
        for _ in 0..4 {
            m.add(buf(vec![i16::MAX; 2], 100));
        }
        assert_eq!(m.next_sample(), 1.0);
    }

    #[test]
    fn test_resampling_stretches_duration() {
        // 50 Hz source on a 100 Hz output: twice as many output samples.
        let mut m = Mixer::new(100);
        m.add(buf(vec![0, 16384, 0, 0], 50));
        let out: Vec<f32> = (0..8).map(|_| m.next_sample()).collect();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.25);
        assert_eq!(out[2], 0.5);
        assert_eq!(out[3], 0.25);
        assert_eq!(m.next_sample(), 0.0);
    }

    #[test]
    fn test_voice_limit() {
        let mut m = Mixer::new(100);
        for _ in 0..MAX_VOICES {
            assert!(m.add(buf(vec![1; 10], 100)));
        }
        assert!(!m.add(buf(vec![1; 10], 100)));
        assert!(!Mixer::new(100).add(buf(vec![], 100)));
    }

    #[test]
    fn test_fill_interleaved() {
        let mut m = Mixer::new(100);
        m.add(buf(vec![16384, 8192], 100));
        let mut out = [9.0f32; 6];
        m.fill(&mut out, 2);
        assert_eq!(out, [0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);
    }
}
