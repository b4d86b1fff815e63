use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice_id::VoiceId;
use crate::audio_api::VoiceParams;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

// Equal-power stereo panner. Mono sources are spread across both sides,
// stereo sources fold the far channel into the near one.
#[derive(Clone, Copy, Debug)]
struct Panner {
    pan: f32,
    gain_l: f32,
    gain_r: f32,
}

impl Panner {
    fn new(pan: f32, mono: bool) -> Self {
        let pan = pan.clamp(-1.0, 1.0);
        let x = if mono {
            (pan + 1.0) * 0.5
        } else if pan <= 0.0 {
            pan + 1.0
        } else {
            pan
        };
        Self {
            pan,
            gain_l: (x * FRAC_PI_2).cos(),
            gain_r: (x * FRAC_PI_2).sin(),
        }
    }

    #[inline]
    fn mono(&self, s: f32) -> StereoFrame {
        StereoFrame::new(s * self.gain_l, s * self.gain_r)
    }

    #[inline]
    fn stereo(&self, l: f32, r: f32) -> StereoFrame {
        if self.pan <= 0.0 {
            StereoFrame::new(l + r * self.gain_l, r * self.gain_r)
        } else {
            StereoFrame::new(l * self.gain_l, r + l * self.gain_r)
        }
    }
}

// source -> gain -> pan, reading a (possibly reversed) buffer at a playback
// rate. Positions are in source frames.
#[derive(Clone, Debug)]
pub struct Voice {
    pub id: VoiceId,
    buffer: Arc<SampleBuffer>,
    pos: f64,
    rate: f64,
    gain: f32,
    panner: Panner,
    start: f64,
    end: f64,
    looping: bool,
    active: bool,
}

impl Voice {
    pub fn new(id: VoiceId, buffer: Arc<SampleBuffer>, params: VoiceParams) -> Self {
        let (start, end) = params.window.frame_range(buffer.sample_rate());
        let end = end.min(buffer.len() as f64);
        let mono = buffer.channel_count() < 2;
        Self {
            id,
            pos: start,
            rate: params.rate.max(0.0) as f64,
            gain: params.gain,
            panner: Panner::new(params.pan, mono),
            start,
            end,
            looping: params.looping,
            active: end > start && !buffer.is_empty(),
            buffer,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    // give the buffer back once the voice is done with it
    pub fn into_buffer(self) -> Arc<SampleBuffer> {
        self.buffer
    }

    #[inline]
    fn read(&self, channel: &[f32]) -> f32 {
        let i = self.pos as usize;
        let frac = (self.pos - i as f64) as f32;
        let s0 = channel.get(i).copied().unwrap_or(0.0);
        let s1 = channel.get(i + 1).copied().unwrap_or(s0);
        lerp(s0, s1, frac)
    }

    // Mix this voice into `out`. Goes inactive once a one-shot runs past the
    // end of its window; looping voices wrap until stopped.
    pub fn render_into(&mut self, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        let buffer = Arc::clone(&self.buffer);
        let left = buffer.channel(0).unwrap_or(&[]);
        let right = buffer.channel(1);
        let span = self.end - self.start;

        for frame in out.iter_mut() {
            if self.pos >= self.end {
                if !self.looping {
                    self.active = false;
                    break;
                }
                self.pos = self.start + (self.pos - self.end) % span;
            }

            let sample = match right {
                Some(right) => self
                    .panner
                    .stereo(self.read(left) * self.gain, self.read(right) * self.gain),
                None => self.panner.mono(self.read(left) * self.gain),
            };
            frame.accumulate(sample);

            self.pos += self.rate;
        }

        // a one-shot that landed exactly on its end is done now, not next block
        if !self.looping && self.pos >= self.end {
            self.active = false;
        }
    }
}
