use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::warn;

use crate::audio_api::{AudioCommand, EngineEvent};
use crate::config::EngineConfig;

/// Handle to a running audio session.
///
/// Owned by the application root and cloned into the parts that talk to the
/// render engine. Holds the session sample rate, the command queue into the
/// audio thread and the event queue coming back out of it.
#[derive(Clone)]
pub struct Session {
    sample_rate: u32,
    config: EngineConfig,
    commands: Sender<AudioCommand>,
    events: Receiver<EngineEvent>,
}

impl Session {
    pub(crate) fn new(
        sample_rate: u32,
        config: EngineConfig,
        commands: Sender<AudioCommand>,
        events: Receiver<EngineEvent>,
    ) -> Self {
        Self {
            sample_rate,
            config,
            commands,
            events,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Never blocks; a full queue drops the command.
    pub fn send(&self, cmd: AudioCommand) {
        match self.commands.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("audio command queue full, dropping command"),
            Err(TrySendError::Disconnected(_)) => warn!("audio engine is gone, dropping command"),
        }
    }

    pub fn drain_events(&self) -> impl Iterator<Item = EngineEvent> + '_ {
        self.events.try_iter()
    }
}
