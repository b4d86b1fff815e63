// The master effects bus. Fixed routing:
//
//   master -> lowpass -> out (dry)
//                     -> reverb -> reverb gain -> out
//                     -> delay <-> feedback
//                              -> delay gain -> out
//
// Built on the control thread (the reverb kernel and FFT plans allocate) and
// shipped to the engine in one piece.

mod delay;
mod filter;
mod reverb;

pub use delay::FeedbackDelay;
pub use filter::Lowpass;
pub use reverb::{ConvolutionReverb, Convolver, noise_impulse};

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use crate::audio_api::EffectParam;

// starting point of a fresh bus: sends silent, filter wide open
pub const DEFAULT_DELAY_TIME: f32 = 0.3;
pub const DEFAULT_DELAY_FEEDBACK: f32 = 0.4;
pub const DEFAULT_FILTER_CUTOFF: f32 = 20000.0;
pub const DEFAULT_FILTER_Q: f32 = 1.0;

// scratch size for the send paths, longer callbacks get chunked
const MAX_BLOCK: usize = 1024;

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

pub struct EffectsBus {
    filter: Lowpass,
    reverb: ConvolutionReverb,
    reverb_gain: f32,
    delay: FeedbackDelay,
    delay_gain: f32,
    reverb_send: Vec<StereoFrame>,
    delay_send: Vec<StereoFrame>,
}

impl EffectsBus {
    pub fn new(sample_rate: u32, impulse: &SampleBuffer, max_delay_seconds: f32) -> Self {
        Self {
            filter: Lowpass::new(sample_rate, DEFAULT_FILTER_CUTOFF, DEFAULT_FILTER_Q),
            reverb: ConvolutionReverb::new(impulse),
            reverb_gain: 0.0,
            delay: FeedbackDelay::new(
                sample_rate,
                max_delay_seconds,
                DEFAULT_DELAY_TIME,
                DEFAULT_DELAY_FEEDBACK,
            ),
            delay_gain: 0.0,
            reverb_send: vec![StereoFrame::zero(); MAX_BLOCK],
            delay_send: vec![StereoFrame::zero(); MAX_BLOCK],
        }
    }

    pub fn apply(&mut self, param: EffectParam) {
        match param {
            EffectParam::ReverbGain(g) => self.reverb_gain = g,
            EffectParam::DelayGain(g) => self.delay_gain = g,
            EffectParam::DelayTime(s) => self.delay.set_delay_time(s),
            EffectParam::DelayFeedback(f) => self.delay.set_feedback(f),
            EffectParam::FilterCutoff(hz) => self.filter.set_cutoff(hz),
            EffectParam::FilterQ(q) => self.filter.set_q(q),
        }
    }

    fn process_chunk(&mut self, buf: &mut [StereoFrame]) {
        let n = buf.len();
        self.filter.process(buf);

        // sends always run so the tails keep moving even while muted
        let reverb_send = &mut self.reverb_send[..n];
        reverb_send.copy_from_slice(buf);
        self.reverb.process(reverb_send);

        let delay_send = &mut self.delay_send[..n];
        delay_send.copy_from_slice(buf);
        self.delay.process(delay_send);

        for ((out, r), d) in buf.iter_mut().zip(&self.reverb_send).zip(&self.delay_send) {
            out.accumulate(r.scaled(self.reverb_gain));
            out.accumulate(d.scaled(self.delay_gain));
        }
    }
}

impl Effect for EffectsBus {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for chunk in buf.chunks_mut(MAX_BLOCK) {
            self.process_chunk(chunk);
        }
    }
}
