//! Host-tunable settings. Timing and adaptation constants are not here: they
//! live as constants next to the code that depends on them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::interval::GameMode;
use crate::noise::NoiseKind;
use crate::synth::Timbre;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Preferred output sample rate; the device may force another.
    pub sample_rate: u32,
    pub master_gain: f32,
    pub mode: GameMode,
    pub timbre: Timbre,
    pub noise: NoiseKind,
    pub high_score_path: PathBuf,
    /// Fixed RNG seed for reproducible sessions.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            master_gain: 1.0,
            mode: GameMode::Medium,
            timbre: Timbre::Sine,
            noise: NoiseKind::None,
            high_score_path: PathBuf::from("intune_high_scores.json"),
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Reads a JSON config. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("[CONFIG] {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&data)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}
