//! High scores per game mode and the `ScoreStore` collaborator that persists
//! them. The engine only decides *whether* a finished game replaces the stored
//! entry; storage belongs to the store.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::difficulty::MAX_DIFFICULTY;
use crate::interval::GameMode;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HighScoreEntry {
    pub score: u32,
    /// Lowest difficulty reached during the game, in percent of a half-step.
    pub difficulty: f64,
}

impl Default for HighScoreEntry {
    fn default() -> Self {
        Self {
            score: 0,
            difficulty: MAX_DIFFICULTY,
        }
    }
}

impl HighScoreEntry {
    /// A candidate wins with a strictly higher score, or the same score at a
    /// strictly smaller difficulty.
    pub fn is_beaten_by(&self, candidate: &HighScoreEntry) -> bool {
        candidate.score > self.score || (candidate.score == self.score && candidate.difficulty < self.difficulty)
    }
}

/// One entry per game mode, serialized as `{ "high": {..}, "medium": {..}, ... }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighScores {
    pub high: HighScoreEntry,
    pub medium: HighScoreEntry,
    pub low: HighScoreEntry,
    pub changing: HighScoreEntry,
}

impl HighScores {
    pub fn get(&self, mode: GameMode) -> &HighScoreEntry {
        match mode {
            GameMode::High => &self.high,
            GameMode::Medium => &self.medium,
            GameMode::Low => &self.low,
            GameMode::Changing => &self.changing,
        }
    }

    fn get_mut(&mut self, mode: GameMode) -> &mut HighScoreEntry {
        match mode {
            GameMode::High => &mut self.high,
            GameMode::Medium => &mut self.medium,
            GameMode::Low => &mut self.low,
            GameMode::Changing => &mut self.changing,
        }
    }

    /// Replaces the entry for `mode` if `candidate` beats it. Returns whether
    /// it did.
    pub fn propose(&mut self, mode: GameMode, candidate: HighScoreEntry) -> bool {
        let entry = self.get_mut(mode);
        if entry.is_beaten_by(&candidate) {
            *entry = candidate;
            true
        } else {
            false
        }
    }
}

/// Persistence collaborator for high scores.
pub trait ScoreStore {
    fn load(&mut self) -> Result<HighScores>;
    fn save(&mut self, scores: &HighScores) -> Result<()>;
}

/// Stores high scores as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileScoreStore {
    path: PathBuf,
}

impl JsonFileScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured `high_score_path`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.high_score_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScoreStore for JsonFileScoreStore {
    /// A missing file is not an error: nobody has finished a game yet.
    fn load(&mut self) -> Result<HighScores> {
        if !self.path.exists() {
            return Ok(HighScores::default());
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let scores = serde_json::from_str(&data)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(scores)
    }

    fn save(&mut self, scores: &HighScores) -> Result<()> {
        let json_string = serde_json::to_string_pretty(scores)?;
        let mut file = File::create(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}

/// In-memory store, optionally failing every call.
#[derive(Debug, Clone, Default)]
pub struct MemoryScoreStore {
    pub scores: HighScores,
    /// Every successfully saved table, oldest first.
    pub saves: Vec<HighScores>,
    pub fail: bool,
}

impl MemoryScoreStore {
    pub fn with_scores(scores: HighScores) -> Self {
        Self {
            scores,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl ScoreStore for MemoryScoreStore {
    fn load(&mut self) -> Result<HighScores> {
        if self.fail {
            return Err(anyhow!("store offline"));
        }
        Ok(self.scores.clone())
    }

    fn save(&mut self, scores: &HighScores) -> Result<()> {
        if self.fail {
            return Err(anyhow!("store offline"));
        }
        self.scores = scores.clone();
        self.saves.push(scores.clone());
        Ok(())
    }
}
