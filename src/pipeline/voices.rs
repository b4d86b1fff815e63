// Control-side voice bookkeeping. Voices themselves live on the audio thread;
// this side mints their ids, keeps one per slot and forgets them again once
// the engine reports them finished.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use super::store::{MAX_PITCH, MIN_PITCH, PadSettings, SampleStore};
use crate::audio::{SampleBuffer, VoiceId, next_voice_id};
use crate::audio_api::{AudioCommand, EngineEvent, TrimWindow, VoiceParams};
use crate::session::Session;
use crate::shared::{PadId, VoiceSlot};

// KEYS mode scale, relative to the pad's own pitch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Note {
    Do,
    Re,
    Mi,
    Fa,
    Sol,
    La,
    Si,
    HighDo,
}

impl Note {
    pub const ALL: [Note; 8] = [
        Note::Do,
        Note::Re,
        Note::Mi,
        Note::Fa,
        Note::Sol,
        Note::La,
        Note::Si,
        Note::HighDo,
    ];

    pub fn ratio(self) -> f32 {
        match self {
            Note::Do => 1.0,
            Note::Re => 1.122,
            Note::Mi => 1.260,
            Note::Fa => 1.335,
            Note::Sol => 1.498,
            Note::La => 1.682,
            Note::Si => 1.888,
            Note::HighDo => 2.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Note::Do => "ド",
            Note::Re => "レ",
            Note::Mi => "ミ",
            Note::Fa => "ファ",
            Note::Sol => "ソ",
            Note::La => "ラ",
            Note::Si => "シ",
            Note::HighDo => "ド↑",
        }
    }

    // KEYS layout: pads 1..=8 climb the scale, pad 9 is the rest
    pub fn for_pad(position: u8) -> Option<Note> {
        match position {
            1..=8 => Some(Self::ALL[position as usize - 1]),
            _ => None,
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown note {0:?}")]
pub struct ParseNoteError(pub String);

impl FromStr for Note {
    type Err = ParseNoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|n| n.symbol() == s)
            .ok_or_else(|| ParseNoteError(s.to_string()))
    }
}

// What got started, for callers that want to show it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceHandle {
    pub id: VoiceId,
    pub slot: VoiceSlot,
    pub rate: f32,
    pub window: TrimWindow,
}

pub struct VoiceEngine {
    session: Session,
    store: SampleStore,
    active: HashMap<VoiceSlot, VoiceId>,
    last_played: Option<PadId>,
}

impl VoiceEngine {
    pub fn new(session: Session) -> Self {
        let store = SampleStore::new(session.sample_rate());
        Self {
            session,
            store,
            active: HashMap::new(),
            last_played: None,
        }
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SampleStore {
        &mut self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Trigger `pad`, retriggering it if it's already sounding.
    pub fn play(&mut self, pad: PadId, pitch_override: Option<f32>, reverse: bool) -> Option<VoiceHandle> {
        let Some(sample) = self.store.get(pad) else {
            debug!(pad = %pad, "play on empty pad ignored");
            return None;
        };
        let buffer = Arc::clone(&sample.buffer);
        let settings = sample.settings;
        // a zero or negative rate would never reach the end of its window
        let rate = pitch_override.map_or(settings.pitch, |p| {
            if p.is_finite() { p.clamp(MIN_PITCH, MAX_PITCH) } else { settings.pitch }
        });

        self.last_played = Some(pad);
        self.start_voice(VoiceSlot::Pad(pad), buffer, settings, rate, reverse)
    }

    /// KEYS mode: replay the last pad at a scale degree. Each pressed pad gets
    /// its own slot so chords ring out.
    pub fn play_with_note(&mut self, pad: PadId, note: Note) -> Option<VoiceHandle> {
        let Some(source) = self.last_played else {
            debug!(pad = %pad, "keys note with nothing played yet");
            return None;
        };
        let Some(sample) = self.store.get(source) else {
            debug!(pad = %pad, source = %source, "keys source pad is empty");
            return None;
        };
        let buffer = Arc::clone(&sample.buffer);
        let settings = sample.settings;
        let rate = settings.pitch * note.ratio();

        self.start_voice(VoiceSlot::Key(pad), buffer, settings, rate, false)
    }

    fn start_voice(
        &mut self,
        slot: VoiceSlot,
        buffer: Arc<SampleBuffer>,
        settings: PadSettings,
        rate: f32,
        reverse: bool,
    ) -> Option<VoiceHandle> {
        self.stop_slot(slot);

        // reversed copies are made per trigger and never cached
        let buffer = if reverse {
            Arc::new(buffer.reversed())
        } else {
            buffer
        };

        let Some(window) = TrimWindow::from_fractions(settings.trim_start, settings.trim_end, buffer.duration())
        else {
            debug!(
                slot = %slot,
                trim_start = settings.trim_start,
                trim_end = settings.trim_end,
                "empty trim window, nothing to play"
            );
            return None;
        };

        let id = next_voice_id();
        let params = VoiceParams {
            rate,
            gain: settings.volume,
            pan: settings.pan,
            window,
            looping: settings.looping,
        };
        self.session.send(AudioCommand::StartVoice { id, buffer, params });
        self.active.insert(slot, id);
        debug!(slot = %slot, voice = id.0, rate, reverse, "voice started");

        Some(VoiceHandle {
            id,
            slot,
            rate,
            window,
        })
    }

    pub fn stop(&mut self, pad: PadId) {
        self.stop_slot(VoiceSlot::Pad(pad));
    }

    pub fn stop_slot(&mut self, slot: VoiceSlot) {
        if let Some(id) = self.active.remove(&slot) {
            self.session.send(AudioCommand::StopVoice(id));
        }
    }

    pub fn stop_all(&mut self) {
        for (_, id) in self.active.drain() {
            self.session.send(AudioCommand::StopVoice(id));
        }
    }

    /// Forget voices the engine finished. A slot that was retriggered since
    /// holds a newer id and is left alone. Buffers handed back with the
    /// events are released here.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        for event in self.session.drain_events() {
            match event {
                EngineEvent::VoiceEnded { id, .. } => {
                    let before = self.active.len();
                    self.active.retain(|_, v| *v != id);
                    reaped += before - self.active.len();
                }
                // already forgotten when the stop was sent
                EngineEvent::VoiceStopped { .. } => {}
            }
        }
        reaped
    }

    pub fn is_playing(&self, pad: PadId) -> bool {
        self.is_slot_active(VoiceSlot::Pad(pad))
    }

    pub fn is_slot_active(&self, slot: VoiceSlot) -> bool {
        self.active.contains_key(&slot)
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    pub fn last_played(&self) -> Option<PadId> {
        self.last_played
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineRenderer, offline};
    use crate::config::EngineConfig;
    use crate::pipeline::store::SettingsPatch;

    const PAD: PadId = PadId::new(1, 1);

    fn engine() -> (VoiceEngine, OfflineRenderer) {
        let config = EngineConfig {
            sample_rate: 1000,
            ..Default::default()
        };
        let (session, renderer) = offline(&config);
        (VoiceEngine::new(session), renderer)
    }

    fn seconds(voices: &mut VoiceEngine, pad: PadId, secs: f32) {
        let sr = voices.store().sample_rate();
        voices.store_mut().synthesize(pad, |_| {
            SampleBuffer::mono(sr, vec![0.5; (sr as f32 * secs) as usize])
        });
    }

    #[test]
    fn play_on_empty_pad_does_nothing() {
        let (mut voices, mut renderer) = engine();
        assert!(voices.play(PAD, None, false).is_none());
        assert_eq!(voices.last_played(), None);
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 0);
    }

    #[test]
    fn retrigger_leaves_one_voice() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 1.0);
        let first = voices.play(PAD, None, false).unwrap();
        let second = voices.play(PAD, None, false).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(voices.active_voices(), 1);
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 1);
    }

    #[test]
    fn stop_without_voice_is_noop() {
        let (mut voices, mut renderer) = engine();
        voices.stop(PAD);
        voices.stop(PAD);
        renderer.pump();
        assert_eq!(voices.active_voices(), 0);
    }

    #[test]
    fn trim_window_follows_settings() {
        let (mut voices, _renderer) = engine();
        seconds(&mut voices, PAD, 4.0);
        voices.store_mut().update_settings(
            PAD,
            SettingsPatch {
                trim_start: Some(0.25),
                trim_end: Some(0.75),
                ..Default::default()
            },
        );
        let handle = voices.play(PAD, None, false).unwrap();
        assert_eq!(handle.window.offset, 1.0);
        assert_eq!(handle.window.duration, 2.0);
    }

    #[test]
    fn inverted_trim_plays_nothing() {
        let (mut voices, _renderer) = engine();
        seconds(&mut voices, PAD, 1.0);
        voices.store_mut().update_settings(
            PAD,
            SettingsPatch {
                trim_start: Some(0.8),
                trim_end: Some(0.2),
                ..Default::default()
            },
        );
        assert!(voices.play(PAD, None, false).is_none());
        assert!(!voices.is_playing(PAD));
    }

    #[test]
    fn pitch_override_wins() {
        let (mut voices, _renderer) = engine();
        seconds(&mut voices, PAD, 1.0);
        voices.store_mut().update_settings(
            PAD,
            SettingsPatch {
                pitch: Some(0.5),
                ..Default::default()
            },
        );
        assert_eq!(voices.play(PAD, None, false).unwrap().rate, 0.5);
        assert_eq!(voices.play(PAD, Some(1.5), false).unwrap().rate, 1.5);
    }

    #[test]
    fn pitch_override_stays_in_range() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 0.1);
        assert_eq!(voices.play(PAD, Some(0.0), false).unwrap().rate, MIN_PITCH);
        assert_eq!(voices.play(PAD, Some(-3.0), false).unwrap().rate, MIN_PITCH);
        assert_eq!(voices.play(PAD, Some(9.0), false).unwrap().rate, MAX_PITCH);
        assert_eq!(voices.play(PAD, Some(f32::NAN), false).unwrap().rate, 1.0);

        voices.play(PAD, Some(0.0), false);
        // 100 frames at half speed end well inside 250 frames
        renderer.render_frames(250);
        assert_eq!(voices.reap(), 1);
        assert!(!voices.is_playing(PAD));
    }

    #[test]
    fn foreign_rate_sample_plays_for_its_real_length() {
        let (mut voices, mut renderer) = engine();
        voices
            .store_mut()
            .insert(PAD, SampleBuffer::mono(500, vec![0.5; 500]), SettingsPatch::default());
        let handle = voices.play(PAD, None, false).unwrap();
        assert_eq!(handle.window.duration, 1.0);

        let out = renderer.render_frames(1200);
        let sounding = out.iter().filter(|f| f.left != 0.0).count();
        assert_eq!(sounding, 1000);
    }

    #[test]
    fn finished_voices_are_reaped() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 0.1);
        voices.play(PAD, None, false);
        assert!(voices.is_playing(PAD));

        renderer.render_frames(200);
        assert_eq!(voices.reap(), 1);
        assert!(!voices.is_playing(PAD));
    }

    #[test]
    fn stopped_voice_buffer_is_released_on_reap() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 0.1);
        let buffer = Arc::clone(&voices.store().get(PAD).unwrap().buffer);
        voices.play(PAD, None, false);
        renderer.pump();

        voices.stop(PAD);
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 0);
        // store, this test and the pending stop event
        assert_eq!(Arc::strong_count(&buffer), 3);
        assert_eq!(voices.reap(), 0);
        assert_eq!(Arc::strong_count(&buffer), 2);
    }

    #[test]
    fn stale_completion_keeps_retriggered_slot() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 0.1);
        voices.play(PAD, None, false);
        // the first voice ends on the audio side before the retrigger lands
        renderer.render_frames(200);
        let second = voices.play(PAD, None, false).unwrap();

        assert_eq!(voices.reap(), 0);
        assert!(voices.is_slot_active(VoiceSlot::Pad(PAD)));
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 1);
        assert_eq!(second.slot, VoiceSlot::Pad(PAD));
    }

    #[test]
    fn keys_use_last_pad_at_note_ratio() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 1.0);
        voices.play(PAD, None, false);

        let key_pad = PadId::new(1, 3);
        let mi = voices.play_with_note(key_pad, "ミ".parse().unwrap()).unwrap();
        let so = voices.play_with_note(PadId::new(1, 5), Note::Sol).unwrap();

        assert!((mi.rate - 1.260).abs() < 1e-6);
        assert_eq!(mi.slot, VoiceSlot::Key(key_pad));
        assert!((so.rate - 1.498).abs() < 1e-6);
        // pad voice plus two key voices ring together
        assert_eq!(voices.active_voices(), 3);
        assert_eq!(voices.last_played(), Some(PAD));
        assert!(!voices.store().contains(key_pad));

        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 3);
    }

    #[test]
    fn keys_without_source_do_nothing() {
        let (mut voices, _renderer) = engine();
        assert!(voices.play_with_note(PAD, Note::Do).is_none());

        seconds(&mut voices, PAD, 1.0);
        voices.play(PAD, None, false);
        voices.store_mut().remove(PAD);
        assert!(voices.play_with_note(PadId::new(1, 2), Note::Do).is_none());
    }

    #[test]
    fn stop_all_clears_every_slot() {
        let (mut voices, mut renderer) = engine();
        seconds(&mut voices, PAD, 1.0);
        voices.store_mut().update_settings(
            PAD,
            SettingsPatch {
                looping: Some(true),
                ..Default::default()
            },
        );
        voices.play(PAD, None, false);
        voices.play_with_note(PadId::new(1, 2), Note::La);
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 2);

        voices.stop_all();
        assert_eq!(voices.active_voices(), 0);
        renderer.pump();
        assert_eq!(renderer.engine().active_voices(), 0);
    }

    #[test]
    fn note_table() {
        assert_eq!(Note::for_pad(1), Some(Note::Do));
        assert_eq!(Note::for_pad(8), Some(Note::HighDo));
        assert_eq!(Note::for_pad(9), None);
        assert_eq!("ド↑".parse::<Note>(), Ok(Note::HighDo));
        assert!("X".parse::<Note>().is_err());
        for note in Note::ALL {
            assert_eq!(note.to_string().parse::<Note>(), Ok(note));
        }
    }

    #[test]
    fn reverse_plays_a_flipped_copy() {
        let (mut voices, mut renderer) = engine();
        let sr = voices.store().sample_rate();
        voices.store_mut().synthesize(PAD, |_| {
            SampleBuffer::mono(sr, (0..100).map(|i| i as f32 / 100.0).collect())
        });
        voices.play(PAD, None, true);
        let out = renderer.render_frames(4);
        // centre-panned mono, so both sides carry cos(pi/4) of the sample
        let g = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0].left - 0.99 * g).abs() < 1e-5);
        assert!((out[1].left - 0.98 * g).abs() < 1e-5);
        // stored buffer untouched
        assert_eq!(voices.store().get(PAD).unwrap().buffer.channel(0).unwrap()[0], 0.0);
    }
}
