use crossbeam_channel::Sender;
use tracing::warn;

use super::effects::{Effect, EffectsBus};
use super::frame::StereoFrame;
use super::voice::Voice;
use crate::audio_api::{AudioCommand, EngineEvent};

// The audio-thread half: owns the playing voices and the effects bus, and
// mixes them into whatever block the device asks for.
pub struct Engine {
    voices: Vec<Voice>,
    max_voices: usize,
    effects: Option<Box<EffectsBus>>,
    events_tx: Sender<EngineEvent>,
}

impl Engine {
    pub fn new(max_voices: usize, events_tx: Sender<EngineEvent>) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: Vec::with_capacity(max_voices),
            max_voices,
            effects: None,
            events_tx,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::StartVoice { id, buffer, params } => {
                if self.voices.len() >= self.max_voices {
                    // hard cap, steal the oldest
                    let stolen = self.voices.remove(0);
                    self.retire(stolen, true);
                }
                self.voices.push(Voice::new(id, buffer, params));
            }
            AudioCommand::StopVoice(id) => {
                // may already be gone, natural end races explicit stops
                if let Some(i) = self.voices.iter().position(|v| v.id == id) {
                    let stopped = self.voices.remove(i);
                    self.retire(stopped, false);
                }
            }
            AudioCommand::InstallEffects(bus) => {
                if self.effects.is_none() {
                    self.effects = Some(bus);
                }
            }
            AudioCommand::SetEffect(param) => {
                if let Some(bus) = self.effects.as_mut() {
                    bus.apply(param);
                }
            }
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn has_effects(&self) -> bool {
        self.effects.is_some()
    }

    fn retire(&self, voice: Voice, ended: bool) {
        let id = voice.id;
        let buffer = voice.into_buffer();
        let event = if ended {
            EngineEvent::VoiceEnded { id, buffer }
        } else {
            EngineEvent::VoiceStopped { id, buffer }
        };
        // a full queue means the buffer gets freed here after all
        if self.events_tx.try_send(event).is_err() {
            warn!(voice = id.0, "engine event queue full, dropping voice event");
        }
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());

        for voice in &mut self.voices {
            voice.render_into(out);
        }

        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].is_active() {
                i += 1;
            } else {
                let done = self.voices.remove(i);
                self.retire(done, true);
            }
        }

        // without an installed bus the master goes straight out
        if let Some(bus) = self.effects.as_mut() {
            bus.process(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audio::{SampleBuffer, VoiceId, next_voice_id};
    use crate::audio_api::{TrimWindow, VoiceParams};

    fn start_buffer(engine: &mut Engine, buffer: Arc<SampleBuffer>, looping: bool) -> VoiceId {
        let id = next_voice_id();
        engine.handle_cmd(AudioCommand::StartVoice {
            id,
            params: VoiceParams {
                rate: 1.0,
                gain: 1.0,
                pan: 0.0,
                window: TrimWindow::from_fractions(0.0, 1.0, buffer.duration()).unwrap(),
                looping,
            },
            buffer,
        });
        id
    }

    fn start(engine: &mut Engine, len: usize, looping: bool) -> VoiceId {
        start_buffer(engine, Arc::new(SampleBuffer::mono(100, vec![0.5; len])), looping)
    }

    fn ended(event: EngineEvent) -> Option<VoiceId> {
        match event {
            EngineEvent::VoiceEnded { id, .. } => Some(id),
            EngineEvent::VoiceStopped { .. } => None,
        }
    }

    #[test]
    fn finished_voices_are_reported() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = Engine::new(4, tx);
        let id = start(&mut engine, 10, false);

        let mut out = vec![StereoFrame::zero(); 16];
        engine.render_block(&mut out);

        assert_eq!(engine.active_voices(), 0);
        assert_eq!(rx.try_recv().ok().and_then(ended), Some(id));
        assert!(out[0].left > 0.0);
        assert_eq!(out[12].left, 0.0);
    }

    #[test]
    fn explicit_stop_is_not_an_end_and_is_idempotent() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = Engine::new(4, tx);
        let id = start(&mut engine, 10, true);

        engine.handle_cmd(AudioCommand::StopVoice(id));
        engine.handle_cmd(AudioCommand::StopVoice(id));
        assert_eq!(engine.active_voices(), 0);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.voice(), id);
        assert_eq!(ended(event), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn voice_cap_steals_the_oldest() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = Engine::new(2, tx);
        let first = start(&mut engine, 10, true);
        start(&mut engine, 10, true);
        start(&mut engine, 10, true);

        assert_eq!(engine.active_voices(), 2);
        assert_eq!(rx.try_recv().ok().and_then(ended), Some(first));
    }

    #[test]
    fn retired_buffers_are_handed_back() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = Engine::new(4, tx);
        let played = Arc::new(SampleBuffer::mono(100, vec![0.5; 10]));
        let looped = Arc::new(SampleBuffer::mono(100, vec![0.5; 10]));
        start_buffer(&mut engine, Arc::clone(&played), false);
        let looping = start_buffer(&mut engine, Arc::clone(&looped), true);

        let mut out = vec![StereoFrame::zero(); 16];
        engine.render_block(&mut out);
        engine.handle_cmd(AudioCommand::StopVoice(looping));
        assert_eq!(engine.active_voices(), 0);

        // the engine let go, the events still hold a reference each
        assert_eq!(Arc::strong_count(&played), 2);
        assert_eq!(Arc::strong_count(&looped), 2);
        drop(rx.try_iter().collect::<Vec<_>>());
        assert_eq!(Arc::strong_count(&played), 1);
        assert_eq!(Arc::strong_count(&looped), 1);
    }
}
