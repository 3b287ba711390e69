use std::time::Duration;

use crossbeam_channel::Receiver;
use intune_core::noise::NoiseSource;
use intune_core::round::RoundPhase;
use intune_core::scores::MemoryScoreStore;
use intune_core::session::{FEEDBACK_DELAY, MAX_STRIKES};
use intune_core::synth::ToneVoice;
use intune_core::{
    Answer, AudioBackend, CoreError, EngineConfig, Event, GameMode, HighScoreEntry, HighScores, Input, Judgment,
    NoiseKind, Phase, Session,
};

#[derive(Debug, Default)]
struct Recorder {
    /// `(frequency, delay)` of every voice handed to the backend.
    played: Vec<(f32, Duration)>,
    /// `Some(kind)` for every noise start, `None` for every stop.
    noise: Vec<Option<NoiseKind>>,
}

impl AudioBackend for Recorder {
    fn sample_rate(&self) -> f32 {
        8_000.0
    }

    fn play(&mut self, voice: ToneVoice, delay: Duration) -> Result<(), CoreError> {
        self.played.push((voice.frequency(), delay));
        Ok(())
    }

    fn start_noise(&mut self, source: NoiseSource) -> Result<(), CoreError> {
        self.noise.push(Some(source.kind()));
        Ok(())
    }

    fn stop_noise(&mut self) -> Result<(), CoreError> {
        self.noise.push(None);
        Ok(())
    }
}

struct Game {
    session: Session<Recorder, MemoryScoreStore>,
    events: Receiver<Event>,
    t: Duration,
}

impl Game {
    fn new(store: MemoryScoreStore) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        let config = EngineConfig {
            seed: Some(2024),
            ..EngineConfig::default()
        };
        Self {
            session: Session::new(&config, Recorder::default(), store, tx),
            events: rx,
            t: Duration::ZERO,
        }
    }

    fn send(&mut self, input: Input) -> Result<(), CoreError> {
        self.session.handle(input, self.t)
    }

    fn wait(&mut self, duration: Duration) {
        self.t += duration;
        self.session.tick(self.t);
    }

    fn tick_at(&mut self, ms: u64) {
        self.t = Duration::from_millis(ms);
        self.session.tick(self.t);
    }

    fn send_at(&mut self, ms: u64, input: Input) -> Result<(), CoreError> {
        self.t = Duration::from_millis(ms);
        self.send(input)
    }

    fn wait_ms(&mut self, ms: u64) {
        self.wait(Duration::from_millis(ms));
    }

    fn wait_for_judgment(&mut self) {
        for _ in 0..100 {
            if self.session.round().phase() == RoundPhase::AwaitingJudgment {
                return;
            }
            self.wait_ms(50);
        }
        panic!("round never reached AwaitingJudgment");
    }

    /// Answers the current round right or wrong on purpose.
    fn answer(&mut self, correct: bool) -> Judgment {
        self.wait_for_judgment();
        let pair = *self.session.round().pair().unwrap();
        let answer = if pair.second.is_higher == correct {
            Answer::Higher
        } else {
            Answer::Lower
        };
        self.send(Input::Judge(answer)).unwrap();
        self.session.snapshot().last_judgment.unwrap()
    }

    fn drain(&self) -> Vec<Event> {
        self.events.try_iter().collect()
    }
}

#[test]
fn three_strikes_end_the_game_and_save_the_score() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();

    assert_eq!(game.answer(true), Judgment::Correct);
    game.wait(FEEDBACK_DELAY);
    assert_eq!(game.answer(true), Judgment::Correct);
    let lowest = game.session.state().lowest_difficulty;
    assert!((lowest - 100.0 * 0.77 * 0.77).abs() < 1e-9);

    for strike in 1..=MAX_STRIKES {
        game.wait(FEEDBACK_DELAY);
        assert_eq!(game.session.phase(), Phase::Playing);
        assert_eq!(game.answer(false), Judgment::Incorrect);
        assert_eq!(game.session.state().strikes, strike);
    }

    // The game ends only once the feedback delay has run out.
    assert_eq!(game.session.phase(), Phase::Feedback);
    assert!(game.session.store().saves.is_empty());
    game.wait(FEEDBACK_DELAY);
    assert_eq!(game.session.phase(), Phase::GameOver);

    let expected = HighScoreEntry {
        score: 2,
        difficulty: lowest,
    };
    let saves = &game.session.store().saves;
    assert_eq!(saves.len(), 1);
    assert_eq!(*saves[0].get(GameMode::Medium), expected);
    assert!(game.session.snapshot().new_high_score);

    let events = game.drain();
    assert!(events.contains(&Event::HighScoreUpdated {
        mode: GameMode::Medium,
        entry: expected
    }));

    // Nothing else is scheduled after game over.
    assert_eq!(game.session.next_deadline(), None);
    assert!(game.send(Input::Judge(Answer::Higher)).is_err());
}

#[test]
fn restart_resets_counters_and_difficulty() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.answer(true);
    game.wait(FEEDBACK_DELAY);
    for _ in 0..MAX_STRIKES {
        game.answer(false);
        game.wait(FEEDBACK_DELAY);
    }
    assert_eq!(game.session.phase(), Phase::GameOver);

    game.send(Input::Restart).unwrap();
    let state = game.session.state();
    assert_eq!(game.session.phase(), Phase::Ready);
    assert_eq!((state.score, state.strikes), (0, 0));
    assert_eq!(state.lowest_difficulty, 100.0);
    assert_eq!(game.session.difficulty(), 100.0);
}

#[test]
fn sandbox_never_ends_and_never_adapts() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::SetSandbox(true)).unwrap();
    game.send(Input::SetDifficulty(12.5)).unwrap();
    game.send(Input::StartRound).unwrap();

    for _ in 0..6 {
        game.answer(false);
        game.wait(FEEDBACK_DELAY);
        assert_eq!(game.session.phase(), Phase::Playing);
    }
    game.answer(true);

    let state = game.session.state();
    assert_eq!(state.strikes, 0);
    assert_eq!(state.score, 1);
    assert_eq!(state.lowest_difficulty, 100.0);
    assert_eq!(game.session.difficulty(), 12.5);
    assert!(game.session.store().saves.is_empty());

    // Difficulty chosen by the operator survives a restart.
    game.send(Input::Restart).unwrap();
    assert_eq!(game.session.difficulty(), 12.5);
}

#[test]
fn sandbox_difficulty_shapes_the_next_pair() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::SetSandbox(true)).unwrap();
    game.send(Input::SetDifficulty(3.0)).unwrap();
    game.send(Input::StartRound).unwrap();
    let pair = *game.session.round().pair().unwrap();
    assert!((pair.interval_cents().abs() - 3.0).abs() < 1e-9);
}

#[test]
fn stale_feedback_timer_cannot_touch_a_new_game() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.answer(true);
    assert_eq!(game.session.phase(), Phase::Feedback);

    // Abandon the game while the feedback continuation is pending, then start over.
    game.wait_ms(100);
    game.send(Input::Restart).unwrap();
    game.wait_ms(100);
    game.send(Input::StartRound).unwrap();
    let new_pair = *game.session.round().pair().unwrap();
    assert_eq!(game.session.state().score, 0);

    // Run well past the moment the old continuation would have fired.
    game.wait(FEEDBACK_DELAY);
    assert_eq!(game.session.phase(), Phase::Playing);
    assert_eq!(*game.session.round().pair().unwrap(), new_pair);
    assert_eq!(game.session.state().score, 0);

    // The new round keeps its own schedule: second pitch 2000 ms after its start.
    game.wait_for_judgment();
    assert_eq!(game.session.round().visible_pitches(), 2);
    assert_eq!(*game.session.round().pair().unwrap(), new_pair);
}

#[test]
fn start_round_during_feedback_skips_the_delay_once() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.answer(true);
    let first_pair = *game.session.round().pair().unwrap();

    game.wait_ms(200);
    game.send(Input::StartRound).unwrap();
    assert_eq!(game.session.phase(), Phase::Playing);
    let skipped_to = *game.session.round().pair().unwrap();
    assert_ne!(skipped_to, first_pair);

    // The cancelled continuation does not start yet another round.
    game.wait(FEEDBACK_DELAY);
    assert_eq!(*game.session.round().pair().unwrap(), skipped_to);
}

#[test]
fn judgments_before_the_second_pitch_are_ignored() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    assert!(game.send(Input::Judge(Answer::Higher)).is_err());
    game.wait_ms(600);
    assert_eq!(game.session.round().visible_pitches(), 1);
    assert!(game.send(Input::Judge(Answer::Lower)).is_err());
    assert!(game.send(Input::Replay).is_err());
    assert_eq!(game.session.state().score, 0);
    assert_eq!(game.session.phase(), Phase::Playing);
}

#[test]
fn noise_changes_do_not_disturb_a_playing_round() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send_at(0, Input::StartRound).unwrap();
    game.tick_at(500);
    assert_eq!(game.session.round().visible_pitches(), 1);
    let pair = *game.session.round().pair().unwrap();

    // Between the two cues: switch noise on, swap it, then switch it off.
    game.send_at(600, Input::ChangeNoise(NoiseKind::Pink)).unwrap();
    game.tick_at(700);
    game.send_at(1000, Input::ChangeNoise(NoiseKind::White)).unwrap();
    game.tick_at(1100);
    game.send_at(1200, Input::ChangeNoise(NoiseKind::None)).unwrap();
    assert_eq!(
        game.session.backend().noise,
        vec![Some(NoiseKind::Pink), None, Some(NoiseKind::White), None]
    );

    // The second pitch still starts 1500 ms after the first.
    game.tick_at(1999);
    assert_eq!(game.session.round().visible_pitches(), 1);
    game.tick_at(2000);
    assert_eq!(game.session.round().visible_pitches(), 2);
    assert_eq!(game.session.round().phase(), RoundPhase::AwaitingJudgment);
    assert_eq!(*game.session.round().pair().unwrap(), pair);
    assert_eq!(game.session.phase(), Phase::Playing);

    let tones: Vec<f32> = game.session.backend().played.iter().map(|(f, _)| *f).collect();
    assert_eq!(tones, vec![pair.first.frequency as f32, pair.second.frequency as f32]);
}

#[test]
fn replay_keeps_score_and_difficulty() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.wait_for_judgment();
    let pair = *game.session.round().pair().unwrap();
    let tones_before = game.session.backend().played.len();

    game.send(Input::Replay).unwrap();
    assert_eq!(game.session.round().visible_pitches(), 0);
    game.wait_for_judgment();

    let played = &game.session.backend().played[tones_before..];
    assert_eq!(
        played.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
        vec![pair.first.frequency as f32, pair.second.frequency as f32]
    );
    assert_eq!(*game.session.round().pair().unwrap(), pair);
    assert_eq!(game.session.difficulty(), 100.0);
    assert_eq!(game.session.state().score, 0);
}

#[test]
fn weaker_game_saves_the_table_unchanged() {
    let mut stored = HighScores::default();
    stored.propose(
        GameMode::Medium,
        HighScoreEntry {
            score: 10,
            difficulty: 4.0,
        },
    );
    let mut game = Game::new(MemoryScoreStore::with_scores(stored.clone()));
    game.send(Input::StartRound).unwrap();
    for _ in 0..MAX_STRIKES {
        game.answer(false);
        game.wait(FEEDBACK_DELAY);
    }

    assert_eq!(game.session.phase(), Phase::GameOver);
    let saves = &game.session.store().saves;
    assert_eq!(saves.len(), 1);
    assert_eq!(
        *saves[0].get(GameMode::Medium),
        HighScoreEntry {
            score: 10,
            difficulty: 4.0
        }
    );
    assert_eq!(game.session.high_scores(), &stored);
    assert!(!game.session.snapshot().new_high_score);
    assert!(
        !game
            .drain()
            .iter()
            .any(|e| matches!(e, Event::HighScoreUpdated { .. }))
    );
}

#[test]
fn save_failure_keeps_score_in_memory() {
    let mut game = Game::new(MemoryScoreStore::failing());
    game.send(Input::StartRound).unwrap();
    game.answer(true);
    game.wait(FEEDBACK_DELAY);
    for _ in 0..MAX_STRIKES {
        game.answer(false);
        game.wait(FEEDBACK_DELAY);
    }

    assert_eq!(game.session.phase(), Phase::GameOver);
    assert_eq!(game.session.high_scores().get(GameMode::Medium).score, 1);
    assert!(game.session.snapshot().new_high_score);
}

#[test]
fn feedback_reveals_the_pair() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.answer(true);
    let pair = *game.session.round().pair().unwrap();
    let reveal = game.session.snapshot().reveal.unwrap();
    assert_eq!(reveal.first.frequency, pair.first.frequency);
    assert_eq!(reveal.second.frequency, pair.second.frequency);
    assert!((reveal.interval_cents.abs() - 100.0).abs() < 1e-9);
    assert!(reveal.first.cents.abs() <= 50.0 + 1e-9);
}

#[test]
fn correct_answer_plays_the_major_triad() {
    let mut game = Game::new(MemoryScoreStore::default());
    game.send(Input::StartRound).unwrap();
    game.wait_for_judgment();
    let before = game.session.backend().played.len();
    game.answer(true);
    let effect: Vec<_> = game.session.backend().played[before..].to_vec();
    assert_eq!(effect.len(), 3);
    assert!((effect[0].0 - 523.25).abs() < 1e-3);
    assert_eq!(effect[0].1, Duration::ZERO);
    assert!((effect[2].1.as_secs_f32() - 0.2).abs() < 1e-4);
}
