// Decoded buffers and per-pad playback settings. Buffers are immutable once
// installed and shared by Arc, so a copied pad and a voice in flight can both
// hold the same data while settings stay per pad.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::{DecodeError, SampleBuffer};
use crate::shared::PadId;

// playback rate range for pad pitch and per-trigger overrides
pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadSettings {
    pub volume: f32,     // 0..1
    pub pitch: f32,      // playback rate, 0.5..2
    pub pan: f32,        // -1..1
    pub trim_start: f32, // fraction of the buffer
    pub trim_end: f32,
    pub looping: bool,
}

impl Default for PadSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            pan: 0.0,
            trim_start: 0.0,
            trim_end: 1.0,
            looping: false,
        }
    }
}

impl PadSettings {
    fn clamped(mut self) -> Self {
        self.volume = self.volume.clamp(0.0, 1.0);
        self.pitch = self.pitch.clamp(MIN_PITCH, MAX_PITCH);
        self.pan = self.pan.clamp(-1.0, 1.0);
        self.trim_start = self.trim_start.clamp(0.0, 1.0);
        self.trim_end = self.trim_end.clamp(0.0, 1.0);
        self
    }
}

// Partial settings update. `None` keeps whatever is there.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub volume: Option<f32>,
    pub pitch: Option<f32>,
    pub pan: Option<f32>,
    pub trim_start: Option<f32>,
    pub trim_end: Option<f32>,
    pub looping: Option<bool>,
}

impl SettingsPatch {
    pub fn apply(&self, base: PadSettings) -> PadSettings {
        PadSettings {
            volume: self.volume.unwrap_or(base.volume),
            pitch: self.pitch.unwrap_or(base.pitch),
            pan: self.pan.unwrap_or(base.pan),
            trim_start: self.trim_start.unwrap_or(base.trim_start),
            trim_end: self.trim_end.unwrap_or(base.trim_end),
            looping: self.looping.unwrap_or(base.looping),
        }
        .clamped()
    }
}

#[derive(Clone, Debug)]
pub struct PadSample {
    pub buffer: Arc<SampleBuffer>,
    pub settings: PadSettings,
}

pub struct SampleStore {
    sample_rate: u32,
    pads: BTreeMap<PadId, PadSample>,
}

impl SampleStore {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            pads: BTreeMap::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode `bytes` and install them on `pad`, replacing whatever was there.
    /// A decode failure leaves the previous entry in place.
    pub fn load(
        &mut self,
        pad: PadId,
        bytes: &[u8],
        patch: SettingsPatch,
    ) -> Result<Arc<SampleBuffer>, DecodeError> {
        let buffer = SampleBuffer::decode(bytes, self.sample_rate)?;
        Ok(self.insert(pad, buffer, patch))
    }

    /// Install an already-decoded buffer, resampled to the store rate if it
    /// was built at another one.
    pub fn insert(&mut self, pad: PadId, buffer: SampleBuffer, patch: SettingsPatch) -> Arc<SampleBuffer> {
        if buffer.sample_rate() != self.sample_rate {
            debug!(pad = %pad, from = buffer.sample_rate(), to = self.sample_rate, "resampling inserted buffer");
        }
        let buffer = Arc::new(buffer.resampled(self.sample_rate));
        debug!(pad = %pad, frames = buffer.len(), channels = buffer.channel_count(), "sample installed");
        self.pads.insert(
            pad,
            PadSample {
                buffer: Arc::clone(&buffer),
                settings: patch.apply(PadSettings::default()),
            },
        );
        buffer
    }

    /// Install a generated buffer. The generator gets the store's sample rate.
    pub fn synthesize<F>(&mut self, pad: PadId, generator: F) -> Arc<SampleBuffer>
    where
        F: FnOnce(u32) -> SampleBuffer,
    {
        let buffer = generator(self.sample_rate);
        self.insert(pad, buffer, SettingsPatch::default())
    }

    pub fn get(&self, pad: PadId) -> Option<&PadSample> {
        self.pads.get(&pad)
    }

    pub fn settings(&self, pad: PadId) -> Option<PadSettings> {
        self.pads.get(&pad).map(|s| s.settings)
    }

    pub fn contains(&self, pad: PadId) -> bool {
        self.pads.contains_key(&pad)
    }

    pub fn len(&self) -> usize {
        self.pads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pads.is_empty()
    }

    // loaded pads in (bank, index) order
    pub fn pads(&self) -> impl Iterator<Item = PadId> + '_ {
        self.pads.keys().copied()
    }

    pub fn update_settings(&mut self, pad: PadId, patch: SettingsPatch) {
        match self.pads.get_mut(&pad) {
            Some(sample) => sample.settings = patch.apply(sample.settings),
            None => debug!(pad = %pad, "settings update for empty pad ignored"),
        }
    }

    pub fn remove(&mut self, pad: PadId) -> Option<PadSample> {
        self.pads.remove(&pad)
    }

    // buffer shared, settings copied by value
    pub fn copy(&mut self, src: PadId, dst: PadId) -> bool {
        let Some(sample) = self.pads.get(&src).cloned() else {
            debug!(src = %src, dst = %dst, "copy from empty pad ignored");
            return false;
        };
        self.pads.insert(dst, sample);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wav_bytes;

    fn pad(bank: u8, index: u8) -> PadId {
        PadId::new(bank, index)
    }

    fn tone(sample_rate: u32) -> SampleBuffer {
        SampleBuffer::mono(sample_rate, vec![0.25; sample_rate as usize / 10])
    }

    #[test]
    fn load_decodes_and_applies_patch() {
        let mut store = SampleStore::new(8000);
        let bytes = wav_bytes(8000, 2, &[1000, -1000, 2000, -2000]);
        let patch = SettingsPatch {
            volume: Some(0.5),
            ..Default::default()
        };
        let buffer = store.load(pad(1, 1), &bytes, patch).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.len(), 2);
        let settings = store.settings(pad(1, 1)).unwrap();
        assert_eq!(settings.volume, 0.5);
        assert_eq!(settings.pitch, 1.0);
        assert_eq!(settings.trim_end, 1.0);
    }

    #[test]
    fn failed_load_keeps_previous_entry() {
        let mut store = SampleStore::new(8000);
        store.insert(pad(1, 1), tone(8000), SettingsPatch::default());
        assert!(store.load(pad(1, 1), b"definitely not a wav", SettingsPatch::default()).is_err());
        assert_eq!(store.get(pad(1, 1)).unwrap().buffer.len(), 800);
    }

    #[test]
    fn foreign_rate_buffers_are_resampled() {
        let mut store = SampleStore::new(1000);
        let buffer = store.insert(pad(1, 1), SampleBuffer::mono(500, vec![0.5; 500]), SettingsPatch::default());
        assert_eq!(buffer.sample_rate(), 1000);
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.duration(), 1.0);

        let generated = store.synthesize(pad(1, 2), |_| SampleBuffer::mono(2000, vec![0.1; 200]));
        assert_eq!(generated.sample_rate(), 1000);
        assert_eq!(generated.len(), 100);
    }

    #[test]
    fn update_merges_and_clamps() {
        let mut store = SampleStore::new(8000);
        store.insert(pad(2, 3), tone(8000), SettingsPatch::default());
        store.update_settings(
            pad(2, 3),
            SettingsPatch {
                pitch: Some(4.0),
                pan: Some(-0.5),
                ..Default::default()
            },
        );
        store.update_settings(
            pad(2, 3),
            SettingsPatch {
                looping: Some(true),
                ..Default::default()
            },
        );
        let s = store.settings(pad(2, 3)).unwrap();
        assert_eq!(s.pitch, 2.0);
        assert_eq!(s.pan, -0.5);
        assert!(s.looping);
        assert_eq!(s.volume, 1.0);
    }

    #[test]
    fn update_on_missing_pad_is_noop() {
        let mut store = SampleStore::new(8000);
        store.update_settings(pad(1, 9), SettingsPatch::default());
        assert!(store.is_empty());
    }

    #[test]
    fn copy_shares_buffer_but_not_settings() {
        let mut store = SampleStore::new(8000);
        store.insert(pad(1, 1), tone(8000), SettingsPatch::default());
        assert!(store.copy(pad(1, 1), pad(1, 2)));

        let a = store.get(pad(1, 1)).unwrap();
        let b = store.get(pad(1, 2)).unwrap();
        assert!(Arc::ptr_eq(&a.buffer, &b.buffer));
        assert_eq!(a.settings, b.settings);

        store.update_settings(
            pad(1, 2),
            SettingsPatch {
                volume: Some(0.1),
                ..Default::default()
            },
        );
        assert_eq!(store.settings(pad(1, 1)).unwrap().volume, 1.0);
        assert_eq!(store.settings(pad(1, 2)).unwrap().volume, 0.1);
    }

    #[test]
    fn copy_from_empty_pad_reports_false() {
        let mut store = SampleStore::new(8000);
        assert!(!store.copy(pad(1, 1), pad(1, 2)));
        assert!(!store.contains(pad(1, 2)));
    }

    #[test]
    fn synthesize_passes_the_store_rate() {
        let mut store = SampleStore::new(22050);
        let buffer = store.synthesize(pad(3, 1), |sr| {
            assert_eq!(sr, 22050);
            tone(sr)
        });
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(store.pads().collect::<Vec<_>>(), vec![pad(3, 1)]);
        assert!(store.remove(pad(3, 1)).is_some());
        assert!(!store.contains(pad(3, 1)));
    }
}
