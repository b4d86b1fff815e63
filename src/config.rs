// Engine sizing knobs. Everything has a default so an empty `{}` (or no file
// at all) gives a working sampler.
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // offline sessions render at this rate; a device session uses whatever
    // the output device reports
    pub sample_rate: u32,
    pub command_capacity: usize,
    pub event_capacity: usize,
    pub max_voices: usize,
    pub reverb_seconds: f32,
    pub max_delay_seconds: f32,
    pub transport_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            command_capacity: 1024,
            event_capacity: 256,
            max_voices: 64,
            reverb_seconds: 2.0,
            max_delay_seconds: 1.0,
            transport_poll_ms: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid engine config")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_all_defaults() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_config_overrides_named_fields() {
        let cfg = EngineConfig::from_json(r#"{ "max_voices": 8, "reverb_seconds": 0.5 }"#).unwrap();
        assert_eq!(cfg.max_voices, 8);
        assert_eq!(cfg.reverb_seconds, 0.5);
        assert_eq!(cfg.sample_rate, 44100);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "sample_rate": 48000 }"#).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().sample_rate, 48000);
        assert!(EngineConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
