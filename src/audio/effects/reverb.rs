//! Convolution reverb.
//!
//! The kernel is a synthetic impulse response: decorrelated noise per channel
//! under a squared decay envelope. Convolution runs uniformly partitioned in
//! the frequency domain so a two second kernel stays affordable on the audio
//! thread; the cost is one partition of latency on the wet signal.

use std::sync::Arc;

use rand::Rng;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::Effect;
use crate::audio::{SampleBuffer, StereoFrame};

pub const PARTITION_SIZE: usize = 512;

// Loudness calibration for normalized kernels, so the wet level doesn't
// depend on how much energy the impulse happens to carry.
const GAIN_CALIBRATION: f32 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;
const MIN_POWER: f32 = 0.000125;

/// Stereo impulse response: uniform noise in [-1, 1) shaped by `(1 - i/len)^2`,
/// generated independently for each channel.
pub fn noise_impulse<R: Rng>(sample_rate: u32, seconds: f32, rng: &mut R) -> SampleBuffer {
    let len = (sample_rate as f32 * seconds.max(0.0)) as usize;
    let channels = (0..2)
        .map(|_| {
            (0..len)
                .map(|i| {
                    let env = 1.0 - i as f32 / len as f32;
                    rng.gen_range(-1.0f32..1.0) * env * env
                })
                .collect()
        })
        .collect();
    SampleBuffer::from_channels(sample_rate, channels)
}

fn normalization_scale(impulse: &SampleBuffer) -> f32 {
    let channels = impulse.channel_count().max(1);
    let len = impulse.len().max(1);
    let energy: f32 = (0..impulse.channel_count())
        .filter_map(|c| impulse.channel(c))
        .flat_map(|ch| ch.iter())
        .map(|s| s * s)
        .sum();
    let mut power = (energy / (channels * len) as f32).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }
    let rate = impulse.sample_rate().max(1) as f32;
    GAIN_CALIBRATION / power * (GAIN_CALIBRATION_SAMPLE_RATE / rate)
}

/// Mono uniformly partitioned overlap-add convolver.
pub struct Convolver {
    block: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    // spectra of each kernel partition
    partitions: Vec<Vec<Complex<f32>>>,
    // spectra of the most recent input blocks, ring indexed by `ring_pos`
    history: Vec<Vec<Complex<f32>>>,
    ring_pos: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    overlap: Vec<f32>,
    fill: usize,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    pub fn new(kernel: &[f32], block: usize) -> Self {
        let block = block.max(1);
        let n = block * 2;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex::default(); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = kernel
            .chunks(block)
            .map(|chunk| {
                let mut spec = vec![Complex::default(); n];
                for (dst, &s) in spec.iter_mut().zip(chunk) {
                    dst.re = s;
                }
                fft.process_with_scratch(&mut spec, &mut scratch);
                spec
            })
            .collect();
        let history = vec![vec![Complex::default(); n]; partitions.len().max(1)];

        Self {
            block,
            fft,
            ifft,
            partitions,
            history,
            ring_pos: 0,
            input: vec![0.0; block],
            output: vec![0.0; block],
            overlap: vec![0.0; block],
            fill: 0,
            spectrum: vec![Complex::default(); n],
            scratch,
        }
    }

    #[inline]
    pub fn next_sample(&mut self, x: f32) -> f32 {
        let y = self.output[self.fill];
        self.input[self.fill] = x;
        self.fill += 1;
        if self.fill == self.block {
            self.fill = 0;
            self.process_block();
        }
        y
    }

    fn process_block(&mut self) {
        let n = self.block * 2;
        let slots = self.history.len();

        // newest input block spectrum
        self.ring_pos = (self.ring_pos + 1) % slots;
        let current = &mut self.history[self.ring_pos];
        for (i, c) in current.iter_mut().enumerate() {
            *c = Complex::new(if i < self.block { self.input[i] } else { 0.0 }, 0.0);
        }
        self.fft.process_with_scratch(current, &mut self.scratch);

        // partition p pairs with the block from p blocks ago
        self.spectrum.fill(Complex::default());
        for (p, part) in self.partitions.iter().enumerate() {
            let hist = &self.history[(self.ring_pos + slots - p) % slots];
            for ((acc, &x), &h) in self.spectrum.iter_mut().zip(hist).zip(part) {
                *acc += x * h;
            }
        }
        self.ifft.process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let norm = 1.0 / n as f32;
        for i in 0..self.block {
            self.output[i] = self.spectrum[i].re * norm + self.overlap[i];
            self.overlap[i] = self.spectrum[i + self.block].re * norm;
        }
    }
}

pub struct ConvolutionReverb {
    left: Convolver,
    right: Convolver,
}

impl ConvolutionReverb {
    // Normalizes the impulse and splits it per channel. A mono impulse is
    // used for both sides.
    pub fn new(impulse: &SampleBuffer) -> Self {
        let scale = normalization_scale(impulse);
        let kernel = |c: usize| -> Vec<f32> {
            impulse
                .channel(c)
                .or_else(|| impulse.channel(0))
                .unwrap_or(&[])
                .iter()
                .map(|s| s * scale)
                .collect()
        };
        Self {
            left: Convolver::new(&kernel(0), PARTITION_SIZE),
            right: Convolver::new(&kernel(1), PARTITION_SIZE),
        }
    }
}

impl Effect for ConvolutionReverb {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            f.left = self.left.next_sample(f.left);
            f.right = self.right.next_sample(f.right);
        }
    }
}
