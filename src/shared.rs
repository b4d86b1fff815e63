// Types and constants shared between the control side (store, voices,
// sequencer) and the render side (audio thread).
//
// Pads are addressed by bank + index, the shell shows three banks of sixteen:
//   bank 1  //  user samples ("1-1" .. "1-16")
//   bank 2  //  drum kit
//   bank 3  //  synth & fx
//
// The core doesn't care what lives in a bank, it only keys on the pair.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const NUM_BANKS: u8 = 3;
pub const PADS_PER_BANK: u8 = 16;
pub const STEPS_PER_PATTERN: u8 = 16;
pub const NUM_PATTERN_SLOTS: usize = 4;

pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 300.0;
pub const DEFAULT_BPM: f32 = 120.0;
pub const MAX_SWING: f32 = 100.0;

// ye olde types
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PadId {
    pub bank: u8,
    pub index: u8,
}

impl PadId {
    pub const fn new(bank: u8, index: u8) -> Self {
        Self { bank, index }
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bank, self.index)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid pad id {0:?}, expected \"<bank>-<index>\"")]
pub struct ParsePadIdError(pub String);

impl FromStr for PadId {
    type Err = ParsePadIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePadIdError(s.to_string());
        let (bank, index) = s.split_once('-').ok_or_else(err)?;
        Ok(Self {
            bank: bank.trim().parse().map_err(|_| err())?,
            index: index.trim().parse().map_err(|_| err())?,
        })
    }
}

// What an active voice is registered under. Direct presses and sequencer
// steps share the pad's slot (so they retrigger each other), KEYS notes get
// their own slot per pressed pad so several notes can ring at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoiceSlot {
    Pad(PadId),
    Key(PadId),
}

impl fmt::Display for VoiceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSlot::Pad(pad) => write!(f, "{pad}"),
            VoiceSlot::Key(pad) => write!(f, "keys_{pad}"),
        }
    }
}
