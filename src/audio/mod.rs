use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use tracing::{error, info};

use crate::audio_api::{AudioCommand, EngineEvent};
use crate::config::EngineConfig;
use crate::session::Session;

mod effects;
mod engine;
mod frame;
mod sample_buffer;
mod voice;
mod voice_id;

pub use effects::{
    ConvolutionReverb, Convolver, DEFAULT_DELAY_FEEDBACK, DEFAULT_DELAY_TIME,
    DEFAULT_FILTER_CUTOFF, DEFAULT_FILTER_Q, Effect, EffectsBus, FeedbackDelay, Lowpass,
    noise_impulse,
};
pub use engine::Engine;
pub use frame::StereoFrame;
pub use sample_buffer::{DecodeError, SampleBuffer};
pub use voice::Voice;
pub use voice_id::{VoiceId, next_voice_id};

#[cfg(test)]
pub(crate) use sample_buffer::wav_bytes;

// frames rendered per pass inside the device callback
const CALLBACK_BLOCK: usize = 1024;

// Keeps the device stream alive; dropping it closes the session's output.
pub struct AudioHandle {
    _output_stream: cpal::Stream,
}

fn channels(config: &EngineConfig) -> (
    crossbeam_channel::Sender<AudioCommand>,
    Receiver<AudioCommand>,
    crossbeam_channel::Sender<EngineEvent>,
    Receiver<EngineEvent>,
) {
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(config.command_capacity.max(1));
    let (event_tx, event_rx) = crossbeam_channel::bounded(config.event_capacity.max(1));
    (cmd_tx, cmd_rx, event_tx, event_rx)
}

// Open the default output device and start rendering into it.
pub fn start_audio(config: &EngineConfig) -> anyhow::Result<(Session, AudioHandle)> {
    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let supported = device.default_output_config().context("no default output config")?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported sample format (only f32 supported for now)");
    }

    let stream_config: cpal::StreamConfig = supported.into();
    let (sample_rate, device_channels) = stream_layout(&stream_config);

    let (cmd_tx, cmd_rx, event_tx, event_rx) = channels(config);
    let engine = Engine::new(config.max_voices, event_tx);
    let stream = build_output_stream_f32(&device, &stream_config, engine, cmd_rx, device_channels)?;
    stream.play().context("failed to play output stream")?;

    info!(sample_rate, channels = device_channels, "audio session started");
    let session = Session::new(sample_rate, config.clone(), cmd_tx, event_rx);
    Ok((session, AudioHandle { _output_stream: stream }))
}

// (sample rate, channel count) the session will render at
fn stream_layout(config: &cpal::StreamConfig) -> (u32, usize) {
    (config.sample_rate, config.channels as usize)
}

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut engine: Engine,
    rx: Receiver<AudioCommand>,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut scratch = vec![StereoFrame::zero(); CALLBACK_BLOCK];
    let err_fn = |err| error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }
            if channels == 0 {
                return;
            }
            for out in data.chunks_mut(CALLBACK_BLOCK * channels) {
                let frames = &mut scratch[..out.len() / channels];
                engine.render_block(frames);
                write_interleaved(frames, out, channels);
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

// stereo master -> device layout: mono devices get the average, extra
// channels beyond the first two stay silent
fn write_interleaved(frames: &[StereoFrame], out: &mut [f32], channels: usize) {
    for (frame, slot) in frames.iter().zip(out.chunks_exact_mut(channels)) {
        match slot {
            [mono] => *mono = (frame.left + frame.right) * 0.5,
            [l, r, rest @ ..] => {
                *l = frame.left;
                *r = frame.right;
                rest.fill(0.0);
            }
            [] => {}
        }
    }
}

/// Drives the render engine by hand instead of from a device callback.
pub struct OfflineRenderer {
    engine: Engine,
    rx: Receiver<AudioCommand>,
}

pub fn offline(config: &EngineConfig) -> (Session, OfflineRenderer) {
    let (cmd_tx, cmd_rx, event_tx, event_rx) = channels(config);
    let engine = Engine::new(config.max_voices, event_tx);
    let session = Session::new(config.sample_rate, config.clone(), cmd_tx, event_rx);
    (session, OfflineRenderer { engine, rx: cmd_rx })
}

impl OfflineRenderer {
    // apply queued commands without rendering
    pub fn pump(&mut self) {
        while let Ok(cmd) = self.rx.try_recv() {
            self.engine.handle_cmd(cmd);
        }
    }

    pub fn render(&mut self, out: &mut [StereoFrame]) {
        self.pump();
        self.engine.render_block(out);
    }

    pub fn render_frames(&mut self, frames: usize) -> Vec<StereoFrame> {
        let mut out = vec![StereoFrame::zero(); frames];
        self.render(&mut out);
        out
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
