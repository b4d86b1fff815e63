use std::collections::{BTreeMap, BTreeSet};

use crate::shared::{PadId, STEPS_PER_PATTERN};

// Which steps each pad fires on. Pads with no steps aren't kept around, so
// two patterns with the same hits compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    steps: BTreeMap<PadId, BTreeSet<u8>>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    // returns whether the step is on afterwards
    pub fn toggle(&mut self, pad: PadId, step: u8) -> bool {
        if step >= STEPS_PER_PATTERN {
            return false;
        }
        let steps = self.steps.entry(pad).or_default();
        let on = steps.insert(step) || !steps.remove(&step);
        if steps.is_empty() {
            self.steps.remove(&pad);
        }
        on
    }

    pub fn is_active(&self, pad: PadId, step: u8) -> bool {
        self.steps.get(&pad).is_some_and(|s| s.contains(&step))
    }

    pub fn pads_at(&self, step: u8) -> impl Iterator<Item = PadId> + '_ {
        self.steps
            .iter()
            .filter(move |(_, steps)| steps.contains(&step))
            .map(|(pad, _)| *pad)
    }

    pub fn steps(&self, pad: PadId) -> impl Iterator<Item = u8> + '_ {
        self.steps.get(&pad).into_iter().flatten().copied()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
