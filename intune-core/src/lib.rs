// intune-core/src/lib.rs

//! The core engine of the InTune ear trainer.
//! This crate plays two successive pitches, judges whether the listener heard
//! the second as higher or lower, and adapts the interval to their skill. It is
//! completely headless and contains no GUI code: a UI forwards [`Input`]s and
//! renders the [`Event`]s it receives.

pub mod audio;
pub mod config;
pub mod difficulty;
pub mod driver;
pub mod error;
pub mod interval;
pub mod noise;
pub mod round;
pub mod scheduler;
pub mod scores;
pub mod session;
pub mod synth;
pub mod tuning;

pub use audio::{AudioBackend, AudioEngine, Mixer};
pub use config::EngineConfig;
pub use error::CoreError;
pub use interval::{GameMode, Pitch, PitchPair};
pub use noise::NoiseKind;
pub use round::{Answer, Judgment, RoundPhase};
pub use scores::{HighScoreEntry, HighScores, JsonFileScoreStore, MemoryScoreStore, ScoreStore};
pub use session::{Input, Phase, Session, SessionState};
pub use synth::Timbre;

use tuning::NoteReading;

/// What the listener heard, revealed once a round is judged.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReveal {
    pub first: NoteReading,
    pub second: NoteReading,
    /// Signed interval from the first to the second pitch.
    pub interval_cents: f64,
}

impl RoundReveal {
    pub fn of(pair: &PitchPair) -> Self {
        Self {
            first: NoteReading::of(pair.first.frequency),
            second: NoteReading::of(pair.second.frequency),
            interval_cents: pair.interval_cents(),
        }
    }
}

/// Everything a UI needs to draw the current screen.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub state: SessionState,
    /// Current difficulty in percent of a half-step.
    pub difficulty: f64,
    pub timbre: Timbre,
    pub noise: NoiseKind,
    pub round_phase: RoundPhase,
    /// 0 = none, 1 = first pitch played, 2 = second pitch played.
    pub visible_pitches: u8,
    pub last_judgment: Option<Judgment>,
    pub reveal: Option<RoundReveal>,
    /// Set on the game-over screen when this game replaced the mode's high score.
    pub new_high_score: bool,
    pub high_scores: HighScores,
}

/// Output of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged(Snapshot),
    HighScoreUpdated { mode: GameMode, entry: HighScoreEntry },
}
