// 16-step sequencer. Time only moves when somebody calls `poll` with the
// current instant; the transport thread does that in the app, tests pass
// made-up instants.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::pattern::Pattern;
use super::voices::VoiceEngine;
use crate::shared::{
    DEFAULT_BPM, MAX_BPM, MAX_SWING, MIN_BPM, NUM_PATTERN_SLOTS, PadId, STEPS_PER_PATTERN,
};

const MIN_STEP_MS: f64 = 10.0;
const TAP_RESET: Duration = Duration::from_millis(2000);
const TAP_WINDOW: usize = 4;

pub type StepHook = Box<dyn FnMut(u8) + Send>;

/// Milliseconds to wait before playing `step`. Swing pushes odd (off-beat)
/// steps late and pulls even steps early by up to half a sixteenth.
pub fn step_interval_ms(bpm: f32, swing: f32, step: u8) -> f64 {
    let base = 60.0 / bpm as f64 * 1000.0 / 4.0;
    let shift = base * (swing as f64 / 100.0) * 0.5;
    let ms = if swing <= 0.0 {
        base
    } else if step % 2 == 1 {
        base + shift
    } else {
        base - shift
    };
    ms.max(MIN_STEP_MS)
}

#[derive(Debug, Default)]
struct TapTempo {
    taps: Vec<Instant>,
}

impl TapTempo {
    // bpm from the average gap of the last few taps, once there are two
    fn tap(&mut self, now: Instant) -> Option<f32> {
        if let Some(&last) = self.taps.last() {
            if now.saturating_duration_since(last) > TAP_RESET {
                self.taps.clear();
            }
        }
        self.taps.push(now);
        if self.taps.len() > TAP_WINDOW {
            self.taps.remove(0);
        }
        if self.taps.len() < 2 {
            return None;
        }

        let span = self.taps[self.taps.len() - 1].saturating_duration_since(self.taps[0]);
        let mean_ms = span.as_secs_f64() * 1000.0 / (self.taps.len() - 1) as f64;
        if mean_ms <= 0.0 {
            return None;
        }
        Some((60000.0 / mean_ms).round() as f32)
    }
}

pub struct Sequencer {
    bpm: f32,
    swing: f32,
    step: u8,
    running: bool,
    next_deadline: Option<Instant>,
    pattern: Pattern,
    saved: [Option<Pattern>; NUM_PATTERN_SLOTS],
    current_slot: usize,
    taps: TapTempo,
    on_step: Option<StepHook>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            swing: 0.0,
            step: 0,
            running: false,
            next_deadline: None,
            pattern: Pattern::new(),
            saved: Default::default(),
            current_slot: 0,
            taps: TapTempo::default(),
            on_step: None,
        }
    }

    fn interval(&self, step: u8) -> Duration {
        Duration::from_secs_f64(step_interval_ms(self.bpm, self.swing, step) / 1000.0)
    }

    pub fn start(&mut self, now: Instant) {
        if self.running {
            return;
        }
        self.running = true;
        self.step = 0;
        self.next_deadline = Some(now + self.interval(0));
        info!(bpm = self.bpm, swing = self.swing, "sequencer started");
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.next_deadline = None;
        self.step = 0;
        self.notify(0);
        info!("sequencer stopped");
    }

    fn notify(&mut self, step: u8) {
        if let Some(hook) = self.on_step.as_mut() {
            hook(step);
        }
    }

    /// Fire the pending step if its deadline has passed. At most one step per
    /// call; returns whether one fired.
    pub fn poll(&mut self, now: Instant, voices: &mut VoiceEngine) -> bool {
        let Some(deadline) = self.next_deadline else {
            return false;
        };
        if !self.running || now < deadline {
            return false;
        }

        let step = self.step;
        for pad in self.pattern.pads_at(step) {
            voices.play(pad, None, false);
        }
        self.notify(step);
        self.step = (step + 1) % STEPS_PER_PATTERN;

        let interval = self.interval(self.step);
        let mut next = deadline + interval;
        if next < now {
            // fell a whole step behind, don't try to catch up with a burst
            debug!(step, behind_ms = (now - next).as_millis() as u64, "sequencer resync");
            next = now + interval;
        }
        self.next_deadline = Some(next);
        true
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline.map(|d| d.saturating_duration_since(now))
    }

    // restarts a running loop from step 0
    pub fn set_bpm(&mut self, bpm: f32, now: Instant) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        if self.running {
            self.stop();
            self.start(now);
        }
    }

    pub fn set_swing(&mut self, swing: f32) {
        self.swing = swing.clamp(0.0, MAX_SWING);
    }

    pub fn tap(&mut self, now: Instant) -> f32 {
        if let Some(bpm) = self.taps.tap(now) {
            debug!(bpm, "tap tempo");
            self.set_bpm(bpm, now);
        }
        self.bpm
    }

    pub fn toggle_step(&mut self, pad: PadId, step: u8) -> bool {
        self.pattern.toggle(pad, step)
    }

    pub fn is_step_active(&self, pad: PadId, step: u8) -> bool {
        self.pattern.is_active(pad, step)
    }

    pub fn clear_pattern(&mut self) {
        self.pattern.clear();
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn set_pattern(&mut self, pattern: Pattern) {
        self.pattern = pattern;
    }

    pub fn save_pattern(&mut self, slot: usize) -> bool {
        let Some(saved) = self.saved.get_mut(slot) else {
            debug!(slot, "no such pattern slot");
            return false;
        };
        *saved = Some(self.pattern.clone());
        self.current_slot = slot;
        true
    }

    pub fn load_pattern(&mut self, slot: usize) -> bool {
        let Some(Some(saved)) = self.saved.get(slot) else {
            return false;
        };
        self.pattern = saved.clone();
        self.current_slot = slot;
        true
    }

    pub fn is_pattern_saved(&self, slot: usize) -> bool {
        matches!(self.saved.get(slot), Some(Some(_)))
    }

    pub fn current_slot(&self) -> usize {
        self.current_slot
    }

    pub fn set_on_step_change<F>(&mut self, hook: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.on_step = Some(Box::new(hook));
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn swing(&self) -> f32 {
        self.swing
    }

    pub fn current_step(&self) -> u8 {
        self.step
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}
