//! # Difficulty Controller
//!
//! Adaptive difficulty in percent of a half-step. A correct answer tightens the
//! interval by a factor of 0.77, a wrong one widens it by 1.30; the two multipliers
//! are part of the training curve and must not be tuned.

/// Multiplier applied after a correct judgment.
pub const CORRECT_FACTOR: f64 = 0.77;
/// Multiplier applied after an incorrect judgment.
pub const INCORRECT_FACTOR: f64 = 1.30;
/// Hardest adaptive difficulty.
pub const MIN_DIFFICULTY: f64 = 1.0;
/// Easiest difficulty, and the starting point of every adaptive game.
pub const MAX_DIFFICULTY: f64 = 100.0;
/// Smallest difficulty an operator may set in sandbox play. Far below this the
/// frequency ratio rounds to exactly 1 and both pitches of a pair coincide.
pub const MIN_SANDBOX_DIFFICULTY: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct DifficultyController {
    difficulty: f64,
    lowest: f64,
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self {
            difficulty: MAX_DIFFICULTY,
            lowest: MAX_DIFFICULTY,
        }
    }
}

impl DifficultyController {
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    /// Smallest difficulty reached by a correct answer this game.
    pub fn lowest(&self) -> f64 {
        self.lowest
    }

    pub fn on_correct(&mut self) {
        self.difficulty = (self.difficulty * CORRECT_FACTOR).max(MIN_DIFFICULTY);
        if self.difficulty < self.lowest {
            self.lowest = self.difficulty;
        }
    }

    pub fn on_incorrect(&mut self) {
        self.difficulty = (self.difficulty * INCORRECT_FACTOR).min(MAX_DIFFICULTY);
    }

    /// Operator-set difficulty for sandbox play, capped at 100. Returns false for
    /// non-finite values and values below [`MIN_SANDBOX_DIFFICULTY`]; the current
    /// difficulty is kept.
    pub fn set(&mut self, difficulty: f64) -> bool {
        if !difficulty.is_finite() || difficulty < MIN_SANDBOX_DIFFICULTY {
            return false;
        }
        self.difficulty = difficulty.min(MAX_DIFFICULTY);
        true
    }

    /// New game. Sandbox keeps the operator's difficulty.
    pub fn reset(&mut self, sandbox: bool) {
        if !sandbox {
            self.difficulty = MAX_DIFFICULTY;
        }
        self.lowest = MAX_DIFFICULTY;
    }
}

/// Display form for the scoreboard: one decimal below 10%, whole
/// percent otherwise.
pub fn format_difficulty(percent: f64) -> String {
    if percent < 10.0 {
        format!("{:.1}", percent)
    } else {
        format!("{}", percent.round())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_tightens_by_fixed_factor() {
        let mut controller = DifficultyController::default();
        controller.on_correct();
        assert!((controller.difficulty() - 77.0).abs() < 1e-12);
        assert!((controller.lowest() - 77.0).abs() < 1e-12);
    }

    #[test]
    fn correct_converges_to_floor() {
        let mut controller = DifficultyController::default();
        let mut previous = controller.difficulty();
        for _ in 0..100 {
            controller.on_correct();
            let d = controller.difficulty();
            assert!(d >= MIN_DIFFICULTY);
            assert!(d <= previous);
            assert!((d - (previous * CORRECT_FACTOR).max(1.0)).abs() < 1e-12);
            previous = d;
        }
        assert_eq!(controller.difficulty(), MIN_DIFFICULTY);
        assert_eq!(controller.lowest(), MIN_DIFFICULTY);
    }

    #[test]
    fn incorrect_relaxes_and_caps() {
        let mut controller = DifficultyController::default();
        controller.set(50.0);
        controller.on_incorrect();
        assert!((controller.difficulty() - 65.0).abs() < 1e-12);
        for _ in 0..10 {
            controller.on_incorrect();
            assert!(controller.difficulty() <= MAX_DIFFICULTY);
        }
        assert_eq!(controller.difficulty(), MAX_DIFFICULTY);
    }

    #[test]
    fn incorrect_does_not_touch_lowest() {
        let mut controller = DifficultyController::default();
        controller.on_correct();
        controller.on_correct();
        let lowest = controller.lowest();
        controller.on_incorrect();
        assert_eq!(controller.lowest(), lowest);
    }

    #[test]
    fn set_rejects_non_positive() {
        let mut controller = DifficultyController::default();
        assert!(!controller.set(0.0));
        assert!(!controller.set(-4.0));
        assert!(!controller.set(f64::NAN));
        assert_eq!(controller.difficulty(), MAX_DIFFICULTY);
        assert!(controller.set(0.5));
        assert_eq!(controller.difficulty(), 0.5);
        assert!(controller.set(250.0));
        assert_eq!(controller.difficulty(), MAX_DIFFICULTY);
    }

    #[test]
    fn set_rejects_values_below_the_sandbox_floor() {
        let mut controller = DifficultyController::default();
        controller.set(5.0);
        assert!(!controller.set(1e-15));
        assert!(!controller.set(MIN_SANDBOX_DIFFICULTY / 2.0));
        assert_eq!(controller.difficulty(), 5.0);

        assert!(controller.set(MIN_SANDBOX_DIFFICULTY));
        assert_eq!(controller.difficulty(), MIN_SANDBOX_DIFFICULTY);
    }

    #[test]
    fn floor_still_separates_the_pitches() {
        use crate::interval::{GameMode, pitch_pair};
        use rand::SeedableRng;
        use rand::rngs::SmallRng;

        let mut rng = SmallRng::seed_from_u64(77);
        for mode in GameMode::ALL {
            for _ in 0..200 {
                let pair = pitch_pair(mode, MIN_SANDBOX_DIFFICULTY, &mut rng);
                assert_ne!(pair.first.frequency, pair.second.frequency);
                let (high, low) = if pair.second.is_higher {
                    (pair.second, pair.first)
                } else {
                    (pair.first, pair.second)
                };
                assert!(high.frequency > low.frequency);
            }
        }
    }

    #[test]
    fn reset_respects_sandbox() {
        let mut controller = DifficultyController::default();
        controller.set(12.0);
        controller.reset(true);
        assert_eq!(controller.difficulty(), 12.0);
        controller.reset(false);
        assert_eq!(controller.difficulty(), MAX_DIFFICULTY);
        assert_eq!(controller.lowest(), MAX_DIFFICULTY);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_difficulty(100.0), "100");
        assert_eq!(format_difficulty(45.6), "46");
        assert_eq!(format_difficulty(7.7), "7.7");
        assert_eq!(format_difficulty(1.0), "1.0");
    }
}
