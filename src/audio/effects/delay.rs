use super::Effect;
use crate::audio::StereoFrame;

/// Stereo delay line with a feedback tap.
///
/// `process` replaces the input with the delayed (wet) signal only; the bus
/// decides how much of it reaches the output. Whatever comes out of the line
/// is also fed back in, scaled by `feedback`.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    buffer: Vec<StereoFrame>,
    write_pos: usize,
    sample_rate: f32,
    delay_frames: f32,
    feedback: f32,
}

impl FeedbackDelay {
    pub fn new(sample_rate: u32, max_delay_seconds: f32, delay_seconds: f32, feedback: f32) -> Self {
        let len = (sample_rate as f32 * max_delay_seconds.max(0.0)) as usize + 2;
        let mut d = Self {
            buffer: vec![StereoFrame::zero(); len],
            write_pos: 0,
            sample_rate: sample_rate as f32,
            delay_frames: 1.0,
            feedback: 0.0,
        };
        d.set_delay_time(delay_seconds);
        d.set_feedback(feedback);
        d
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_frames / self.sample_rate
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        let max = (self.buffer.len() - 2) as f32;
        self.delay_frames = (seconds * self.sample_rate).clamp(1.0, max.max(1.0));
    }

    // anything at or above 1.0 would ring forever
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, 0.95);
    }

    #[inline]
    fn read(&self) -> StereoFrame {
        let len = self.buffer.len();
        let back = self.delay_frames;
        let whole = back.floor() as usize;
        let frac = back - whole as f32;
        // newest sample sits at write_pos - 1
        let a = self.buffer[(self.write_pos + len - whole) % len];
        let b = self.buffer[(self.write_pos + len - whole - 1) % len];
        StereoFrame::new(
            a.left + (b.left - a.left) * frac,
            a.right + (b.right - a.right) * frac,
        )
    }

    #[inline]
    pub fn next_frame(&mut self, input: StereoFrame) -> StereoFrame {
        let delayed = self.read();
        let mut fed = input;
        fed.accumulate(delayed.scaled(self.feedback));
        self.buffer[self.write_pos] = fed;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
        delayed
    }
}

impl Effect for FeedbackDelay {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            *f = self.next_frame(*f);
        }
    }
}
