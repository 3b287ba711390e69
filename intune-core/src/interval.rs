//! # Interval Math
//!
//! Turns a difficulty (percent of one half-step) into a frequency ratio and draws
//! the two pitches of a round.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::tuning::{HALF_STEP_RATIO, calculate_cents_deviation};

/// Register the first pitch of a round is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    High,
    Medium,
    Low,
    /// Full band; the register effectively changes every round.
    Changing,
}

impl GameMode {
    pub const ALL: [GameMode; 4] = [
        GameMode::High,
        GameMode::Medium,
        GameMode::Low,
        GameMode::Changing,
    ];

    /// Frequency band `(min, max)` in Hz.
    pub fn band(self) -> (f64, f64) {
        match self {
            GameMode::High => (660.0, 1320.0),   // E5 to E6
            GameMode::Medium => (330.0, 660.0),  // E4 to E5
            GameMode::Low => (110.0, 220.0),     // A2 to A3
            GameMode::Changing => (110.0, 1320.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GameMode::High => "high",
            GameMode::Medium => "medium",
            GameMode::Low => "low",
            GameMode::Changing => "changing",
        }
    }
}

/// One of the two tones of a round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pitch {
    /// Frequency in Hz, always > 0.
    pub frequency: f64,
    /// True when this pitch is the greater of its pair.
    pub is_higher: bool,
}

/// The two pitches of a round, in playback order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchPair {
    pub first: Pitch,
    pub second: Pitch,
}

impl PitchPair {
    /// Signed interval from the first to the second pitch, in cents.
    pub fn interval_cents(&self) -> f64 {
        calculate_cents_deviation(self.second.frequency, self.first.frequency)
    }
}

/// `2^(difficulty/1200) - 1`: the fractional frequency step for a difficulty in
/// percent of a half-step.
pub fn ratio_for_difficulty(difficulty_percent: f64) -> f64 {
    HALF_STEP_RATIO.powf(difficulty_percent / 100.0) - 1.0
}

/// Draws a base frequency from `mode`'s band and places the second pitch
/// `difficulty_percent` of a half-step above or below it.
///
/// The first pitch is always the base; a fair coin decides the direction of the
/// second.
pub fn pitch_pair<R: Rng + ?Sized>(mode: GameMode, difficulty_percent: f64, rng: &mut R) -> PitchPair {
    let (min, max) = mode.band();
    let base = rng.gen_range(min..=max);
    let ratio = ratio_for_difficulty(difficulty_percent);
    let second_is_higher = rng.gen_bool(0.5);

    let other = if second_is_higher {
        base * (1.0 + ratio)
    } else {
        base / (1.0 + ratio)
    };

    PitchPair {
        first: Pitch {
            frequency: base,
            is_higher: !second_is_higher,
        },
        second: Pitch {
            frequency: other,
            is_higher: second_is_higher,
        },
    }
}
