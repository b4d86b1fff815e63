// hakata: pad sampler core. Three banks of sixteen pads, a 16-step sequencer
// with swing and tap tempo, and a master bus through filter, reverb and
// delay.
//
//   shell -> Sampler (middle) -> pipeline (store, voices, sequencer, fx knobs)
//         -> Session -> audio thread (engine, voices, effects bus) -> cpal

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod loader;
pub mod middle;
pub mod pipeline;
pub mod session;
pub mod shared;
pub mod transport;

pub use audio::{AudioHandle, DecodeError, OfflineRenderer, SampleBuffer, StereoFrame, offline, start_audio};
pub use config::EngineConfig;
pub use middle::Sampler;
pub use pipeline::{
    EffectsGraph, EffectsState, Note, PadSettings, Pattern, SampleStore, Sequencer, SettingsPatch,
    VoiceEngine, VoiceHandle,
};
pub use session::Session;
pub use shared::{PadId, VoiceSlot};
pub use transport::Transport;
