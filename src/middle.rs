// The app root. Owns everything the shell pokes at and glues the pieces
// together; the shell (or the transport thread) only ever talks to this.

use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use crate::loader::sample_loader;
use crate::pipeline::{EffectsGraph, Sequencer, SettingsPatch, VoiceEngine};
use crate::session::Session;
use crate::shared::{NUM_BANKS, PADS_PER_BANK, PadId};

pub struct Sampler {
    session: Session,
    voices: VoiceEngine,
    effects: EffectsGraph,
    sequencer: Sequencer,
    clipboard: Option<PadId>,
}

impl Sampler {
    pub fn new(session: Session) -> Self {
        Self {
            voices: VoiceEngine::new(session.clone()),
            effects: EffectsGraph::new(session.clone()),
            sequencer: Sequencer::new(),
            clipboard: None,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn voices(&self) -> &VoiceEngine {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoiceEngine {
        &mut self.voices
    }

    pub fn effects(&self) -> &EffectsGraph {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectsGraph {
        &mut self.effects
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        &mut self.sequencer
    }

    // one turn of the control loop: forget finished voices, fire a due step
    pub fn tick(&mut self, now: Instant) -> bool {
        self.voices.reap();
        self.sequencer.poll(now, &mut self.voices)
    }

    pub fn copy_pad(&mut self, src: PadId) {
        self.clipboard = Some(src);
    }

    pub fn paste_pad(&mut self, dst: PadId) -> bool {
        let Some(src) = self.clipboard else {
            return false;
        };
        self.voices.store_mut().copy(src, dst)
    }

    pub fn delete_pad(&mut self, pad: PadId) {
        self.voices.stop(pad);
        if self.voices.store_mut().remove(pad).is_some() {
            info!(pad = %pad, "pad cleared");
        }
    }

    /// Fill `bank` from the .wav files in `dir`, in name order, one per pad.
    /// Files that don't decode are skipped. Returns how many pads got loaded.
    pub fn load_bank_dir(&mut self, bank: u8, dir: &Path) -> anyhow::Result<usize> {
        if bank == 0 || bank > NUM_BANKS {
            anyhow::bail!("no bank {bank}, expected 1..={NUM_BANKS}");
        }
        let paths = sample_loader::index_wav_in_dir(dir)?;

        let mut loaded = 0;
        for (index, path) in (1..=PADS_PER_BANK).zip(paths) {
            let pad = PadId::new(bank, index);
            let result = sample_loader::read_sample(&path).and_then(|bytes| {
                self.voices
                    .store_mut()
                    .load(pad, &bytes, SettingsPatch::default())
                    .map_err(anyhow::Error::from)
            });
            match result {
                Ok(_) => loaded += 1,
                Err(e) => warn!(pad = %pad, path = %path.display(), "skipping sample: {e:#}"),
            }
        }
        info!(bank, loaded, dir = %dir.display(), "bank loaded");
        Ok(loaded)
    }
}
