use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use std::sync::Arc;

use crate::error::AudioError;
use crate::mixer::{Mixer, MAX_VOICES};
use crate::note_bank::{AudioBuffer, NoteTrigger};

/// Live note output via cpal.
///
/// Holds the cpal `Stream` alive; drop this to stop sound. Notes arrive via
/// the `PlaybackHandle` returned from `start`, which may live on any thread.
pub struct CpalPlayer {
    _stream: Stream,
}

/// Sending side of the note queue. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: Sender<Arc<AudioBuffer>>,
}

impl NoteTrigger for PlaybackHandle {
    fn trigger(&self, buffer: &Arc<AudioBuffer>) {
        // try_send: the perception loop must never block on audio.
        if self.tx.try_send(buffer.clone()).is_err() {
            warn!("Note queue full, dropping {}", buffer.key);
        }
    }
}

impl CpalPlayer {
    /// Open the default output device and start an always-running stream.
    pub fn start() -> Result<(Self, PlaybackHandle), AudioError> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        info!(
            "Audio output: {}",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Stream(format!("no supported output config: {e}")))?;

        let format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!("Output config: {}Hz  {} ch  {:?}", sample_rate, channels, format);

        let (tx, rx) = crossbeam_channel::bounded::<Arc<AudioBuffer>>(MAX_VOICES);

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, rx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, rx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, rx)?,
            fmt => return Err(AudioError::UnsupportedFormat(format!("{fmt:?}"))),
        };

        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok((Self { _stream: stream }, PlaybackHandle { tx }))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    rx: Receiver<Arc<AudioBuffer>>,
) -> Result<Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mixer = Mixer::new(config.sample_rate.0);
    let mut mono: Vec<f32> = Vec::new();

    let err_fn = |e: cpal::StreamError| error!("Audio stream error: {e}");

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for buffer in rx.try_iter() {
                    mixer.add(buffer);
                }
                mono.resize(data.len(), 0.0);
                mixer.fill(&mut mono, channels);
                for (out, s) in data.iter_mut().zip(mono.iter()) {
                    *out = T::from_sample(*s);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}
