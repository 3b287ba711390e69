//! # Session State Machine
//!
//! Owns the score, strikes, mode and sandbox flag of a game, sequences rounds,
//! and reports every visible change as an [`Event`].
//!
//! ```text
//!            +--> Settings --+
//!            +--> Info ------+
//!            |               v
//! GameOver -restart-> Ready --start--> Playing --judge--> Feedback --1500ms--> Playing
//!    ^                                                        |
//!    +-------------------- 3 strikes, 1500ms -----------------+
//! ```
//!
//! Everything runs on one cooperative timeline: the host calls [`Session::tick`]
//! regularly and [`Session::handle`] for input, both with a monotonic timestamp.
//! Delays are entries in a [`Scheduler`]; every state-resetting action cancels
//! the continuations it makes obsolete, so a stale timer can never act on a new
//! game.

use std::time::Duration;

use crossbeam_channel::Sender;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::audio::AudioBackend;
use crate::config::EngineConfig;
use crate::difficulty::DifficultyController;
use crate::error::CoreError;
use crate::interval::GameMode;
use crate::noise::{NoiseGenerator, NoiseKind};
use crate::round::{Answer, Cue, Judgment, RoundSequencer};
use crate::scheduler::{Scheduler, TimerToken};
use crate::scores::{HighScoreEntry, HighScores, ScoreStore};
use crate::synth::{SoundEffect, Timbre};
use crate::{Event, RoundReveal, Snapshot};

/// Time the judgment feedback stays up before the next round (or game over).
pub const FEEDBACK_DELAY: Duration = Duration::from_millis(1500);
/// Quiet gap between stopping one noise stream and starting the next.
pub const NOISE_RESTART_DEBOUNCE: Duration = Duration::from_millis(100);
/// Incorrect answers that end an adaptive game.
pub const MAX_STRIKES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Playing,
    Feedback,
    GameOver,
    Settings,
    Info,
}

/// Input forwarded by the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    StartRound,
    Judge(Answer),
    Replay,
    ChangeMode(GameMode),
    ChangeTimbre(Timbre),
    ChangeNoise(NoiseKind),
    SetSandbox(bool),
    /// Sandbox only.
    SetDifficulty(f64),
    OpenSettings,
    OpenInfo,
    Close,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionState {
    pub score: u32,
    pub strikes: u32,
    pub lowest_difficulty: f64,
    pub mode: GameMode,
    pub sandbox: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Round(Cue),
    AdvanceFromFeedback,
    StartNoise(NoiseKind),
}

impl From<Cue> for Action {
    fn from(cue: Cue) -> Self {
        Action::Round(cue)
    }
}

pub struct Session<B: AudioBackend, S: ScoreStore> {
    backend: B,
    store: S,
    events: Sender<Event>,
    rng: SmallRng,

    scheduler: Scheduler<Action>,
    round: RoundSequencer,
    difficulty: DifficultyController,
    noise: NoiseGenerator,

    phase: Phase,
    state: SessionState,
    timbre: Timbre,
    noise_choice: NoiseKind,
    high_scores: HighScores,

    feedback_timer: Option<TimerToken>,
    noise_timer: Option<TimerToken>,

    last_judgment: Option<Judgment>,
    reveal: Option<RoundReveal>,
    new_high_score: bool,

    audio_warned: bool,
    now: Duration,
}

impl<B: AudioBackend, S: ScoreStore> Session<B, S> {
    /// Creates a session in `Ready`, loading high scores from `store` and
    /// starting the configured background noise.
    pub fn new(config: &EngineConfig, backend: B, mut store: S, events: Sender<Event>) -> Self {
        let high_scores = match store.load() {
            Ok(scores) => scores,
            Err(e) => {
                let err = CoreError::PersistenceFailure(format!("{:#}", e));
                log::warn!("[SCORES] {}; starting from empty high scores", err);
                HighScores::default()
            }
        };
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let difficulty = DifficultyController::default();

        let mut session = Self {
            backend,
            store,
            events,
            rng,
            scheduler: Scheduler::default(),
            round: RoundSequencer::default(),
            noise: NoiseGenerator::default(),
            phase: Phase::Ready,
            state: SessionState {
                score: 0,
                strikes: 0,
                lowest_difficulty: difficulty.lowest(),
                mode: config.mode,
                sandbox: false,
            },
            difficulty,
            timbre: config.timbre,
            noise_choice: config.noise,
            high_scores,
            feedback_timer: None,
            noise_timer: None,
            last_judgment: None,
            reveal: None,
            new_high_score: false,
            audio_warned: false,
            now: Duration::ZERO,
        };

        if config.noise != NoiseKind::None {
            let result = session.noise.start(config.noise, &mut session.backend, &mut session.rng);
            session.note_audio(result);
        }
        log::info!("[SESSION] Ready in {} mode", session.state.mode.name());
        session.publish();
        session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn difficulty(&self) -> f64 {
        self.difficulty.difficulty()
    }

    pub fn timbre(&self) -> Timbre {
        self.timbre
    }

    pub fn high_scores(&self) -> &HighScores {
        &self.high_scores
    }

    pub fn round(&self) -> &RoundSequencer {
        &self.round
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Latest timestamp seen by the session.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// When the next scheduled continuation is due, if any.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            state: self.state,
            difficulty: self.difficulty.difficulty(),
            timbre: self.timbre,
            noise: self.noise_choice,
            round_phase: self.round.phase(),
            visible_pitches: self.round.visible_pitches(),
            last_judgment: self.last_judgment,
            reveal: self.reveal.clone(),
            new_high_score: self.new_high_score,
            high_scores: self.high_scores.clone(),
        }
    }

    /// Fires every continuation due at or before `now`, in order.
    pub fn tick(&mut self, now: Duration) {
        self.now = self.now.max(now);
        let mut changed = false;
        while let Some((fired_at, action)) = self.scheduler.pop_due(self.now) {
            self.dispatch(fired_at, action);
            changed = true;
        }
        if changed {
            self.publish();
        }
    }

    /// Applies one input at `now`. Input that is illegal in the current phase
    /// leaves the session untouched and is reported as `InvalidTransition`.
    pub fn handle(&mut self, input: Input, now: Duration) -> Result<(), CoreError> {
        self.tick(now);
        let result = self.apply(input);
        match &result {
            Ok(()) => self.publish(),
            Err(e) => log::debug!("[SESSION] {}", e),
        }
        result
    }

    /// Stops background noise and drops every pending continuation.
    pub fn shutdown(&mut self) {
        self.scheduler.clear();
        self.feedback_timer = None;
        self.noise_timer = None;
        let result = self.noise.stop(&mut self.backend);
        self.note_audio(result);
    }

    fn apply(&mut self, input: Input) -> Result<(), CoreError> {
        let now = self.now;
        match (input, self.phase) {
            (Input::StartRound, Phase::Ready) => {
                log::info!(
                    "[SESSION] New game: {} mode, {:.1}% difficulty{}",
                    self.state.mode.name(),
                    self.difficulty.difficulty(),
                    if self.state.sandbox { ", sandbox" } else { "" }
                );
                self.start_round(now);
            }
            (Input::StartRound, Phase::Feedback) => {
                self.cancel_feedback();
                self.advance_from_feedback(now);
            }
            (Input::Judge(answer), Phase::Playing) => {
                let judgment = self.round.judge(answer).ok_or_else(|| self.reject(input))?;
                self.resolve(judgment, now);
            }
            (Input::Replay, Phase::Playing) => {
                if !self.round.replay(&mut self.scheduler, now) {
                    return Err(self.reject(input));
                }
            }
            (Input::ChangeMode(mode), Phase::Ready | Phase::Settings) => {
                self.state.mode = mode;
            }
            (Input::SetSandbox(sandbox), Phase::Ready | Phase::Settings) => {
                self.state.sandbox = sandbox;
                self.difficulty.reset(sandbox);
                self.state.lowest_difficulty = self.difficulty.lowest();
            }
            (Input::SetDifficulty(difficulty), phase) if self.state.sandbox && phase != Phase::GameOver => {
                if !self.difficulty.set(difficulty) {
                    return Err(CoreError::InvalidDifficulty(difficulty));
                }
            }
            (Input::ChangeTimbre(timbre), _) => self.timbre = timbre,
            (Input::ChangeNoise(kind), _) => self.change_noise(kind, now),
            (Input::OpenSettings, Phase::Ready) => self.phase = Phase::Settings,
            (Input::OpenInfo, Phase::Ready) => self.phase = Phase::Info,
            (Input::Close, Phase::Settings | Phase::Info) => self.phase = Phase::Ready,
            (Input::Restart, Phase::Playing | Phase::Feedback | Phase::GameOver) => self.reset_game(),
            _ => return Err(self.reject(input)),
        }
        Ok(())
    }

    fn reject(&self, input: Input) -> CoreError {
        CoreError::invalid(self.phase, input)
    }

    fn dispatch(&mut self, fired_at: Duration, action: Action) {
        match action {
            Action::Round(cue) => {
                let result = self.round.on_cue(
                    cue,
                    fired_at,
                    &mut self.scheduler,
                    &mut self.backend,
                    &mut self.rng,
                );
                self.note_audio(result);
            }
            Action::AdvanceFromFeedback => {
                self.feedback_timer = None;
                if self.phase == Phase::Feedback {
                    self.advance_from_feedback(fired_at);
                }
            }
            Action::StartNoise(kind) => {
                self.noise_timer = None;
                if kind == self.noise_choice {
                    let result = self.noise.start(kind, &mut self.backend, &mut self.rng);
                    self.note_audio(result);
                }
            }
        }
    }

    fn start_round(&mut self, at: Duration) {
        self.phase = Phase::Playing;
        self.last_judgment = None;
        self.reveal = None;
        self.round.start(
            self.state.mode,
            self.difficulty.difficulty(),
            self.timbre,
            &mut self.rng,
            &mut self.scheduler,
            at,
        );
    }

    fn resolve(&mut self, judgment: Judgment, at: Duration) {
        let sandbox = self.state.sandbox;
        match judgment {
            Judgment::Correct => {
                self.state.score += 1;
                if !sandbox {
                    self.difficulty.on_correct();
                    self.state.lowest_difficulty = self.difficulty.lowest();
                }
                self.play_effect(SoundEffect::Correct);
            }
            Judgment::Incorrect => {
                if !sandbox {
                    self.state.strikes += 1;
                    self.difficulty.on_incorrect();
                }
                self.play_effect(SoundEffect::Incorrect);
            }
        }
        log::debug!(
            "[SESSION] {:?}: score {}, strikes {}, difficulty {:.2}%",
            judgment,
            self.state.score,
            self.state.strikes,
            self.difficulty.difficulty()
        );

        self.last_judgment = Some(judgment);
        self.reveal = self.round.pair().map(RoundReveal::of);
        self.phase = Phase::Feedback;
        self.cancel_feedback();
        self.feedback_timer = Some(self.scheduler.schedule_after(at, FEEDBACK_DELAY, Action::AdvanceFromFeedback));
    }

    fn advance_from_feedback(&mut self, at: Duration) {
        if !self.state.sandbox && self.state.strikes >= MAX_STRIKES {
            self.game_over();
        } else {
            self.start_round(at);
        }
    }

    fn game_over(&mut self) {
        let mode = self.state.mode;
        let candidate = HighScoreEntry {
            score: self.state.score,
            difficulty: self.state.lowest_difficulty,
        };
        log::info!(
            "[SESSION] Game over in {} mode: score {}, smallest difference {:.2}%",
            mode.name(),
            candidate.score,
            candidate.difficulty
        );

        if self.high_scores.propose(mode, candidate) {
            log::info!("[SCORES] New high score for {} mode", mode.name());
            self.new_high_score = true;
            let _ = self.events.send(Event::HighScoreUpdated { mode, entry: candidate });
        }
        // Every finished game writes the table back, replaced entry or not.
        if let Err(e) = self.store.save(&self.high_scores) {
            let err = CoreError::PersistenceFailure(format!("{:#}", e));
            log::warn!("[SCORES] {}; keeping the scores for this session only", err);
        }

        self.phase = Phase::GameOver;
        self.play_effect(SoundEffect::GameOver);
    }

    fn reset_game(&mut self) {
        self.cancel_feedback();
        self.round.cancel(&mut self.scheduler);
        self.difficulty.reset(self.state.sandbox);
        self.state.score = 0;
        self.state.strikes = 0;
        self.state.lowest_difficulty = self.difficulty.lowest();
        self.last_judgment = None;
        self.reveal = None;
        self.new_high_score = false;
        self.phase = Phase::Ready;
        log::debug!("[SESSION] Reset to Ready");
    }

    fn cancel_feedback(&mut self) {
        if let Some(token) = self.feedback_timer.take() {
            self.scheduler.cancel(token);
        }
    }

    fn change_noise(&mut self, kind: NoiseKind, now: Duration) {
        self.noise_choice = kind;
        if let Some(token) = self.noise_timer.take() {
            self.scheduler.cancel(token);
        }
        let result = self.noise.stop(&mut self.backend);
        self.note_audio(result);
        if kind != NoiseKind::None {
            self.noise_timer = Some(self.scheduler.schedule_after(now, NOISE_RESTART_DEBOUNCE, Action::StartNoise(kind)));
        }
    }

    fn play_effect(&mut self, effect: SoundEffect) {
        let sample_rate = self.backend.sample_rate();
        for (delay, voice) in effect.voices(sample_rate) {
            let result = self.backend.play(voice, delay);
            self.note_audio(result);
        }
    }

    /// Audio failures never affect game logic; the first one is a warning.
    fn note_audio(&mut self, result: Result<(), CoreError>) {
        if let Err(e) = result {
            if self.audio_warned {
                log::debug!("[AUDIO] {}", e);
            } else {
                log::warn!("[AUDIO] {}; continuing without sound", e);
                self.audio_warned = true;
            }
        }
    }

    fn publish(&self) {
        // A UI that went away is not the engine's problem.
        let _ = self.events.send(Event::StateChanged(self.snapshot()));
    }
}
