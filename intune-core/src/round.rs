//! # Round Sequencer
//!
//! Plays the two pitches of a round on a fixed schedule and accepts exactly one
//! judgment once the second pitch has started:
//!
//! ```text
//! Idle --500ms--> PlayingFirst --1500ms--> PlayingSecond -> AwaitingJudgment --judge--> Resolved
//!                      ^                                          |
//!                      +------------------ replay ----------------+
//! ```
//!
//! The sequencer never sleeps. It books its cues on the caller's [`Scheduler`]
//! and reacts when the caller hands a due cue back through [`RoundSequencer::on_cue`].

use std::time::Duration;

use rand::{Rng, RngCore};

use crate::audio::AudioBackend;
use crate::error::CoreError;
use crate::interval::{GameMode, PitchPair, pitch_pair};
use crate::scheduler::{Scheduler, TimerToken};
use crate::synth::{TONE_DURATION, Timbre, render};

/// Silence before the first pitch of a round (and of a replay).
pub const LEAD_IN: Duration = Duration::from_millis(500);
/// Onset-to-onset time between the two pitches: the 1 s tone plus a 500 ms gap.
pub const PITCH_ONSET_GAP: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    PlayingFirst,
    PlayingSecond,
    AwaitingJudgment,
    Resolved,
}

/// Timed playback steps of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Higher,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Judgment {
    Correct,
    Incorrect,
}

/// Compares an answer with the truth of the second pitch. Deterministic.
pub fn judge_answer(answer: Answer, second_is_higher: bool) -> Judgment {
    match (answer, second_is_higher) {
        (Answer::Higher, true) | (Answer::Lower, false) => Judgment::Correct,
        _ => Judgment::Incorrect,
    }
}

#[derive(Debug)]
pub struct RoundSequencer {
    phase: RoundPhase,
    pair: Option<PitchPair>,
    timbre: Timbre,
    /// 0 = nothing played yet, 1 = first pitch started, 2 = second pitch started.
    visible: u8,
    pending: Option<TimerToken>,
}

impl Default for RoundSequencer {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Idle,
            pair: None,
            timbre: Timbre::default(),
            visible: 0,
            pending: None,
        }
    }
}

impl RoundSequencer {
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn pair(&self) -> Option<&PitchPair> {
        self.pair.as_ref()
    }

    pub fn timbre(&self) -> Timbre {
        self.timbre
    }

    pub fn visible_pitches(&self) -> u8 {
        self.visible
    }

    /// Draws a new pitch pair and books the first cue after the lead-in.
    /// Any cue still pending from a previous round is cancelled.
    pub fn start<A, R>(
        &mut self,
        mode: GameMode,
        difficulty: f64,
        timbre: Timbre,
        rng: &mut R,
        scheduler: &mut Scheduler<A>,
        now: Duration,
    ) -> PitchPair
    where
        A: From<Cue>,
        R: Rng + ?Sized,
    {
        self.cancel(scheduler);
        let pair = pitch_pair(mode, difficulty, rng);
        log::debug!(
            "[ROUND] New pair {:.2} Hz -> {:.2} Hz ({:.2}% of a half-step, {:?})",
            pair.first.frequency,
            pair.second.frequency,
            difficulty,
            timbre
        );
        self.pair = Some(pair);
        self.timbre = timbre;
        self.phase = RoundPhase::Idle;
        self.visible = 0;
        self.pending = Some(scheduler.schedule_after(now, LEAD_IN, A::from(Cue::First)));
        pair
    }

    /// Plays the same pair again on the same schedule. Only legal while awaiting
    /// a judgment; returns false (and changes nothing) otherwise.
    pub fn replay<A: From<Cue>>(&mut self, scheduler: &mut Scheduler<A>, now: Duration) -> bool {
        if self.phase != RoundPhase::AwaitingJudgment {
            return false;
        }
        log::debug!("[ROUND] Replay");
        self.phase = RoundPhase::PlayingFirst;
        self.visible = 0;
        self.pending = Some(scheduler.schedule_after(now, LEAD_IN, A::from(Cue::First)));
        true
    }

    /// Handles a due cue that fired at `fired_at`.
    ///
    /// State advances even if the backend fails to play; the error is returned
    /// for the caller to log.
    pub fn on_cue<A, B, R>(
        &mut self,
        cue: Cue,
        fired_at: Duration,
        scheduler: &mut Scheduler<A>,
        backend: &mut B,
        rng: &mut R,
    ) -> Result<(), CoreError>
    where
        A: From<Cue>,
        B: AudioBackend + ?Sized,
        R: RngCore + ?Sized,
    {
        let Some(pair) = self.pair else {
            return Ok(());
        };

        let frequency = match cue {
            Cue::First if self.visible == 0 && matches!(self.phase, RoundPhase::Idle | RoundPhase::PlayingFirst) => {
                self.phase = RoundPhase::PlayingFirst;
                self.visible = 1;
                // Chained from the scheduled fire time so late ticks do not stretch the gap.
                self.pending = Some(scheduler.schedule_at(fired_at + PITCH_ONSET_GAP, A::from(Cue::Second)));
                pair.first.frequency
            }
            Cue::Second if self.visible == 1 && self.phase == RoundPhase::PlayingFirst => {
                self.phase = RoundPhase::PlayingSecond;
                self.visible = 2;
                self.pending = None;
                pair.second.frequency
            }
            _ => {
                log::debug!("[ROUND] Ignoring stale {:?} cue in {:?}", cue, self.phase);
                return Ok(());
            }
        };

        let voice = render(frequency, TONE_DURATION, self.timbre, backend.sample_rate(), rng);
        let played = backend.play(voice, Duration::ZERO);

        if self.phase == RoundPhase::PlayingSecond {
            self.phase = RoundPhase::AwaitingJudgment;
        }
        played
    }

    /// Judges the round. `None` when no judgment is being awaited.
    pub fn judge(&mut self, answer: Answer) -> Option<Judgment> {
        if self.phase != RoundPhase::AwaitingJudgment {
            return None;
        }
        let pair = self.pair?;
        let judgment = judge_answer(answer, pair.second.is_higher);
        log::debug!("[ROUND] Answer {:?} -> {:?}", answer, judgment);
        self.phase = RoundPhase::Resolved;
        Some(judgment)
    }

    /// Abandons the round: cancels any pending cue and forgets the pair.
    pub fn cancel<A>(&mut self, scheduler: &mut Scheduler<A>) {
        if let Some(token) = self.pending.take() {
            scheduler.cancel(token);
        }
        self.phase = RoundPhase::Idle;
        self.pair = None;
        self.visible = 0;
    }
}
