//! # Musical Tuning Module
//!
//! Equal-temperament helpers used to describe the pitches of a round once it has
//! been judged. The engine never needs note names to *generate* pitches (they are
//! drawn from continuous frequency bands), but revealing "A4 +12 cents" after a
//! judgment is how a listener learns what they just heard.
//!
//! ## Features
//! - 88-key piano note table (A0 to C8, A4 = 440 Hz)
//! - Nearest-note lookup for an arbitrary frequency
//! - Cent deviation and interval measurements

use once_cell::sync::Lazy;

/// Frequency ratio of one equal-tempered half-step, `2^(1/12)`.
pub const HALF_STEP_RATIO: f64 = 1.059_463_094_359_295_3;

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Statically computed notes for a standard 88-key piano (A0 to C8).
///
/// Computed once on first use with A4 = 440 Hz.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];

    (0..88)
        .map(|i: usize| {
            // A4 is key index 48; f = 440 * 2^(n/12) with n semitones away from A4.
            let frequency = 440.0 * 2.0_f64.powf((i as f64 - 48.0) / 12.0);
            // The octave number changes at C, three keys above each A.
            let octave = (i + 9) / 12;
            Note {
                name: format!("{}{}", NOTE_NAMES[i % 12], octave),
                frequency,
            }
        })
        .collect()
});

/// Finds the closest piano note to a given frequency.
///
/// Comparison happens in cents rather than Hz so that the choice is symmetric
/// around each note.
///
/// # Returns
/// * `(note_name, note_frequency)`
pub fn find_nearest_note(freq: f64) -> (String, f64) {
    let closest = NOTES
        .iter()
        .min_by(|a, b| {
            let diff_a = calculate_cents_deviation(freq, a.frequency).abs();
            let diff_b = calculate_cents_deviation(freq, b.frequency).abs();
            diff_a.total_cmp(&diff_b)
        })
        .map(|note| (note.name.clone(), note.frequency));

    // NOTES always holds 88 entries.
    closest.unwrap_or_else(|| ("A4".to_string(), 440.0))
}

/// Calculates the deviation from a target frequency in cents.
///
/// 100 cents = 1 half-step, 1200 cents = 1 octave. Positive values are sharp.
pub fn calculate_cents_deviation(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}

/// A frequency described relative to the nearest equal-tempered note.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteReading {
    pub frequency: f64,
    pub note_name: String,
    pub cents: f64,
}

impl NoteReading {
    pub fn of(frequency: f64) -> Self {
        let (note_name, target) = find_nearest_note(frequency);
        Self {
            frequency,
            note_name,
            cents: calculate_cents_deviation(frequency, target),
        }
    }
}
