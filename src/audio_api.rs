// The contract between the control side and the audio thread. The engine
// can't decode or allocate big things without glitching, so everything heavy
// (buffers, reversed copies, the reverb kernel) is prepared on the control
// side and handed over fully built, and buffers come back the same way.

use std::sync::Arc;

pub use crate::audio::{EffectsBus, SampleBuffer, VoiceId};

// Which part of a buffer a voice plays, in seconds of buffer content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrimWindow {
    pub offset: f64,
    pub duration: f64,
}

impl TrimWindow {
    // trim fractions are clamped into [0, 1]; an empty or inverted window is
    // rejected rather than played with a negative length
    pub fn from_fractions(trim_start: f32, trim_end: f32, total: f64) -> Option<Self> {
        let start = trim_start.clamp(0.0, 1.0) as f64;
        let end = trim_end.clamp(0.0, 1.0) as f64;
        if end <= start || total <= 0.0 {
            return None;
        }
        Some(Self {
            offset: total * start,
            duration: total * (end - start),
        })
    }

    pub fn end(&self) -> f64 {
        self.offset + self.duration
    }

    // (first frame, one past the last frame) at the given rate
    pub fn frame_range(&self, sample_rate: u32) -> (f64, f64) {
        let sr = sample_rate as f64;
        (self.offset * sr, self.end() * sr)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceParams {
    pub rate: f32,
    pub gain: f32,
    pub pan: f32,
    pub window: TrimWindow,
    pub looping: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EffectParam {
    ReverbGain(f32),
    DelayGain(f32),
    DelayTime(f32),
    DelayFeedback(f32),
    FilterCutoff(f32),
    FilterQ(f32),
}

pub enum AudioCommand {
    StartVoice {
        id: VoiceId,
        buffer: Arc<SampleBuffer>,
        params: VoiceParams,
    },
    StopVoice(VoiceId),
    // master bus -> effects bus, built off the audio thread
    InstallEffects(Box<EffectsBus>),
    SetEffect(EffectParam),
}

// What the audio thread reports back. Retired voices hand their buffer back
// with the event so the last reference (often a reversed copy only that voice
// held) is dropped on the control side, not inside the device callback.
#[derive(Clone, Debug)]
pub enum EngineEvent {
    // played to the end of its window (or was stolen by the voice cap)
    VoiceEnded { id: VoiceId, buffer: Arc<SampleBuffer> },
    // removed by an explicit stop
    VoiceStopped { id: VoiceId, buffer: Arc<SampleBuffer> },
}

impl EngineEvent {
    pub fn voice(&self) -> VoiceId {
        match self {
            EngineEvent::VoiceEnded { id, .. } | EngineEvent::VoiceStopped { id, .. } => *id,
        }
    }
}
