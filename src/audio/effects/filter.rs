use std::f64::consts::PI;

use super::Effect;
use crate::audio::StereoFrame;

// 2nd order lowpass, direct form II transposed. Q is a resonance in dB, the
// same convention a browser BiquadFilterNode uses for lowpass, so Q = 0 dB
// is a flat corner and 15 dB is a strong peak.
#[derive(Debug, Clone)]
pub struct Lowpass {
    sample_rate: f64,
    cutoff: f64,
    q_db: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // per channel state
    z: [[f64; 2]; 2],
}

impl Lowpass {
    pub fn new(sample_rate: u32, cutoff: f32, q_db: f32) -> Self {
        let mut f = Self {
            sample_rate: sample_rate as f64,
            cutoff: cutoff as f64,
            q_db: q_db as f64,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z: [[0.0; 2]; 2],
        };
        f.update_coefficients();
        f
    }

    pub fn set_cutoff(&mut self, hz: f32) {
        self.cutoff = hz as f64;
        self.update_coefficients();
    }

    pub fn set_q(&mut self, q_db: f32) {
        self.q_db = q_db as f64;
        self.update_coefficients();
    }

    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate * 0.5;
        let normalized = (self.cutoff / nyquist).max(0.0);

        // at or above nyquist the filter is a wire
        if normalized >= 1.0 {
            (self.b0, self.b1, self.b2, self.a1, self.a2) = (1.0, 0.0, 0.0, 0.0, 0.0);
            return;
        }
        if normalized <= 0.0 {
            (self.b0, self.b1, self.b2, self.a1, self.a2) = (0.0, 0.0, 0.0, 0.0, 0.0);
            return;
        }

        let w0 = PI * normalized;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * 10f64.powf(self.q_db / 20.0));

        let a0 = 1.0 + alpha;
        let b1 = (1.0 - cos_w0) / a0;
        self.b0 = b1 * 0.5;
        self.b1 = b1;
        self.b2 = b1 * 0.5;
        self.a1 = (-2.0 * cos_w0) / a0;
        self.a2 = (1.0 - alpha) / a0;
    }

    #[inline]
    fn tick(&mut self, channel: usize, x: f32) -> f32 {
        let x = x as f64;
        let [z1, z2] = self.z[channel];
        let y = self.b0 * x + z1;
        self.z[channel] = [self.b1 * x - self.a1 * y + z2, self.b2 * x - self.a2 * y];
        y as f32
    }
}

impl Effect for Lowpass {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            f.left = self.tick(0, f.left);
            f.right = self.tick(1, f.right);
        }
    }
}
