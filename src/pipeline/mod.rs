// Control-side state: what's loaded, what's playing, what the sequencer and
// the effects knobs are set to. Nothing in here runs on the audio thread.

pub mod effects;
pub mod pattern;
pub mod sequencer;
pub mod store;
pub mod voices;

pub use effects::{EffectsGraph, EffectsState};
pub use pattern::Pattern;
pub use sequencer::{Sequencer, StepHook, step_interval_ms};
pub use store::{PadSample, PadSettings, SampleStore, SettingsPatch};
pub use voices::{Note, ParseNoteError, VoiceEngine, VoiceHandle};
