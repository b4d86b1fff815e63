// Master effects controls. The bus itself runs on the audio thread; this side
// builds it once, ships it over and then only sends parameter changes.
//
// Knobs are normalized 0..1 and mapped here:
//   reverb   -> return gain   v * 0.5
//   delay    -> return gain   v * 0.6
//   time     -> seconds       0.05 + v * 0.95
//   feedback -> gain          v, at most 0.95
//   filter   -> cutoff Hz     100 * 200^v   (100 Hz .. 20 kHz)
//   resonance-> Q             0.5 + v * 15

use rand::Rng;
use tracing::{debug, info};

use crate::audio::{
    DEFAULT_DELAY_FEEDBACK, DEFAULT_DELAY_TIME, DEFAULT_FILTER_CUTOFF, DEFAULT_FILTER_Q, EffectsBus,
    noise_impulse,
};
use crate::audio_api::{AudioCommand, EffectParam};
use crate::session::Session;

pub const MAX_FEEDBACK: f32 = 0.95;

pub fn reverb_gain(v: f32) -> f32 {
    v.clamp(0.0, 1.0) * 0.5
}

pub fn delay_gain(v: f32) -> f32 {
    v.clamp(0.0, 1.0) * 0.6
}

pub fn delay_time(v: f32) -> f32 {
    0.05 + v.clamp(0.0, 1.0) * 0.95
}

pub fn delay_feedback(v: f32) -> f32 {
    v.clamp(0.0, MAX_FEEDBACK)
}

pub fn filter_frequency(v: f32) -> f32 {
    100.0 * 200f32.powf(v.clamp(0.0, 1.0))
}

pub fn filter_q(v: f32) -> f32 {
    0.5 + v.clamp(0.0, 1.0) * 15.0
}

// Current bus values, already mapped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectsState {
    pub reverb_gain: f32,
    pub delay_gain: f32,
    pub delay_time: f32,
    pub delay_feedback: f32,
    pub filter_cutoff: f32,
    pub filter_q: f32,
}

impl Default for EffectsState {
    fn default() -> Self {
        Self {
            reverb_gain: 0.0,
            delay_gain: 0.0,
            delay_time: DEFAULT_DELAY_TIME,
            delay_feedback: DEFAULT_DELAY_FEEDBACK,
            filter_cutoff: DEFAULT_FILTER_CUTOFF,
            filter_q: DEFAULT_FILTER_Q,
        }
    }
}

pub struct EffectsGraph {
    session: Session,
    state: EffectsState,
    initialized: bool,
}

impl EffectsGraph {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            state: EffectsState::default(),
            initialized: false,
        }
    }

    pub fn init(&mut self) {
        self.init_with_rng(&mut rand::thread_rng());
    }

    /// Build the bus around a noise impulse drawn from `rng`. Only the first
    /// call does anything.
    pub fn init_with_rng<R: Rng>(&mut self, rng: &mut R) {
        if self.initialized {
            return;
        }
        let sample_rate = self.session.sample_rate();
        let config = self.session.config();
        let impulse = noise_impulse(sample_rate, config.reverb_seconds, rng);
        let bus = EffectsBus::new(sample_rate, &impulse, config.max_delay_seconds);
        self.session.send(AudioCommand::InstallEffects(Box::new(bus)));
        self.initialized = true;
        info!(sample_rate, impulse_frames = impulse.len(), "effects bus installed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn state(&self) -> EffectsState {
        self.state
    }

    fn send(&self, param: EffectParam) -> bool {
        if !self.initialized {
            debug!(?param, "effects not initialized, ignoring");
            return false;
        }
        self.session.send(AudioCommand::SetEffect(param));
        true
    }

    pub fn set_reverb_amount(&mut self, v: f32) {
        let gain = reverb_gain(v);
        if self.send(EffectParam::ReverbGain(gain)) {
            self.state.reverb_gain = gain;
        }
    }

    pub fn set_delay_amount(&mut self, v: f32) {
        let gain = delay_gain(v);
        if self.send(EffectParam::DelayGain(gain)) {
            self.state.delay_gain = gain;
        }
    }

    pub fn set_delay_time(&mut self, v: f32) {
        let seconds = delay_time(v);
        if self.send(EffectParam::DelayTime(seconds)) {
            self.state.delay_time = seconds;
        }
    }

    pub fn set_delay_feedback(&mut self, v: f32) {
        let feedback = delay_feedback(v);
        if self.send(EffectParam::DelayFeedback(feedback)) {
            self.state.delay_feedback = feedback;
        }
    }

    pub fn set_filter_frequency(&mut self, v: f32) {
        let hz = filter_frequency(v);
        if self.send(EffectParam::FilterCutoff(hz)) {
            self.state.filter_cutoff = hz;
        }
    }

    pub fn set_filter_resonance(&mut self, v: f32) {
        let q = filter_q(v);
        if self.send(EffectParam::FilterQ(q)) {
            self.state.filter_q = q;
        }
    }
}
