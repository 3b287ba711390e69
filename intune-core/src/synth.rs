//! # Tone Synthesizer
//!
//! Renders a single timed pitch with one of seven fixed timbres. A rendered
//! [`ToneVoice`] is a self-contained sample generator; the audio backend pulls
//! samples from it until it reports [`ToneVoice::is_finished`].
//!
//! Every recipe is a set of layers, each an oscillator (or filtered breath noise)
//! multiplied by a breakpoint envelope. All envelopes start and end at zero so that
//! no voice produces a click at its edges.

use std::f32::consts::PI;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Length of every test tone, in seconds.
pub const TONE_DURATION: f32 = 1.0;

/// Synthesis recipe used to render a pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timbre {
    #[default]
    Sine,
    Sawtooth,
    Square,
    Triangle,
    Piano,
    Violin,
    Flute,
}

impl Timbre {
    pub const ALL: [Timbre; 7] = [
        Timbre::Sine,
        Timbre::Sawtooth,
        Timbre::Square,
        Timbre::Triangle,
        Timbre::Piano,
        Timbre::Violin,
        Timbre::Flute,
    ];
}

/// Basic oscillator shapes, all in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Sawtooth,
    Square,
    Triangle,
}

/// Phase-accumulator oscillator with phase in `[0, 1)`.
#[derive(Debug, Clone)]
struct Oscillator {
    waveform: Waveform,
    phase: f32,
}

impl Oscillator {
    fn new(waveform: Waveform) -> Self {
        Self { waveform, phase: 0.0 }
    }

    #[inline]
    fn next_sample(&mut self, freq_hz: f32, sample_rate: f32) -> f32 {
        let out = match self.waveform {
            Waveform::Sine => (self.phase * 2.0 * PI).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };
        self.phase += freq_hz / sample_rate;
        self.phase -= self.phase.floor();
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ramp {
    Linear,
    /// Both endpoints must be strictly positive.
    Exponential,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    end: f32,
    target: f32,
    ramp: Ramp,
}

/// Piecewise amplitude curve starting at 0 at time 0.
///
/// Segments are ramps toward a target value ending at an absolute time, the
/// same model as an automation timeline on an audio parameter.
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    segments: Vec<Segment>,
}

impl Envelope {
    fn linear_to(mut self, target: f32, end: f32) -> Self {
        self.segments.push(Segment { end, target, ramp: Ramp::Linear });
        self
    }

    fn exponential_to(mut self, target: f32, end: f32) -> Self {
        self.segments.push(Segment { end, target, ramp: Ramp::Exponential });
        self
    }

    /// Linear attack to `peak`, hold, linear release ending at `duration`.
    pub fn trapezoid(peak: f32, attack: f32, release: f32, duration: f32) -> Self {
        let attack = attack.min(duration / 2.0);
        let release = release.min(duration / 2.0);
        Envelope::default()
            .linear_to(peak, attack)
            .linear_to(peak, duration - release)
            .linear_to(0.0, duration)
    }

    /// Amplitude at `t` seconds. Holds the last target after the final segment.
    pub fn level(&self, t: f32) -> f32 {
        let mut start_time = 0.0;
        let mut start_value = 0.0;
        for segment in &self.segments {
            if t < segment.end {
                let span = segment.end - start_time;
                if span <= 0.0 {
                    return segment.target;
                }
                let x = ((t - start_time) / span).clamp(0.0, 1.0);
                return match segment.ramp {
                    Ramp::Linear => start_value + (segment.target - start_value) * x,
                    Ramp::Exponential => start_value * (segment.target / start_value).powf(x),
                };
            }
            start_time = segment.end;
            start_value = segment.target;
        }
        start_value
    }
}

/// Second-order high-pass filter (RBJ cookbook), transposed direct form II.
#[derive(Debug, Clone)]
struct HighPass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl HighPass {
    fn new(cutoff_hz: f32, sample_rate: f32) -> Self {
        const Q: f32 = std::f32::consts::FRAC_1_SQRT_2;
        let cutoff = cutoff_hz.clamp(10.0, sample_rate * 0.45);
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * Q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 + cos_w0) / 2.0 / a0,
            b1: -(1.0 + cos_w0) / a0,
            b2: (1.0 + cos_w0) / 2.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let out = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * out + self.z2;
        self.z2 = self.b2 * input - self.a2 * out;
        out
    }
}

#[derive(Debug, Clone)]
enum Source {
    Tone {
        osc: Oscillator,
        frequency: f32,
        /// `(rate_hz, depth_hz)` frequency modulation.
        vibrato: Option<(f32, f32)>,
    },
    Breath {
        rng: SmallRng,
        gain: f32,
        filter: HighPass,
    },
}

#[derive(Debug, Clone)]
struct Layer {
    source: Source,
    envelope: Envelope,
}

impl Layer {
    #[inline]
    fn next_sample(&mut self, t: f32, sample_rate: f32) -> f32 {
        let raw = match &mut self.source {
            Source::Tone { osc, frequency, vibrato } => {
                let freq = match vibrato {
                    Some((rate, depth)) => *frequency + *depth * (2.0 * PI * *rate * t).sin(),
                    None => *frequency,
                };
                osc.next_sample(freq, sample_rate)
            }
            Source::Breath { rng, gain, filter } => {
                let white: f32 = rng.gen_range(-1.0..=1.0);
                filter.process(white * *gain)
            }
        };
        raw * self.envelope.level(t)
    }
}

/// A finite, already-scheduled sound: one pitch in one timbre.
#[derive(Debug, Clone)]
pub struct ToneVoice {
    timbre: Timbre,
    frequency: f32,
    duration: f32,
    sample_rate: f32,
    position: u64,
    total: u64,
    layers: Vec<Layer>,
}

impl ToneVoice {
    fn with_layers(timbre: Timbre, frequency: f32, duration: f32, sample_rate: f32, layers: Vec<Layer>) -> Self {
        Self {
            timbre,
            frequency,
            duration,
            sample_rate,
            position: 0,
            total: (duration * sample_rate).round() as u64,
            layers,
        }
    }

    /// A single oscillator with a 50 ms linear attack and release.
    pub fn oscillator(waveform: Waveform, frequency: f32, duration: f32, peak: f32, sample_rate: f32) -> Self {
        let timbre = match waveform {
            Waveform::Sine => Timbre::Sine,
            Waveform::Sawtooth => Timbre::Sawtooth,
            Waveform::Square => Timbre::Square,
            Waveform::Triangle => Timbre::Triangle,
        };
        let layer = Layer {
            source: Source::Tone {
                osc: Oscillator::new(waveform),
                frequency,
                vibrato: None,
            },
            envelope: Envelope::trapezoid(peak, 0.05, 0.05, duration),
        };
        Self::with_layers(timbre, frequency, duration, sample_rate, vec![layer])
    }

    pub fn timbre(&self) -> Timbre {
        self.timbre
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Total length in samples.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.total
    }

    /// Next output sample; silence once finished.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.is_finished() {
            return 0.0;
        }
        let t = self.position as f32 / self.sample_rate;
        let sample_rate = self.sample_rate;
        let out = self.layers.iter_mut().map(|layer| layer.next_sample(t, sample_rate)).sum();
        self.position += 1;
        out
    }

    /// Renders the whole voice into a buffer (offline use and tests).
    pub fn render_to_vec(mut self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.total as usize);
        while !self.is_finished() {
            out.push(self.next_sample());
        }
        out
    }
}

fn tone_layer(waveform: Waveform, frequency: f32, envelope: Envelope) -> Layer {
    Layer {
        source: Source::Tone {
            osc: Oscillator::new(waveform),
            frequency,
            vibrato: None,
        },
        envelope,
    }
}

/// Renders `frequency` for `duration` seconds in the given timbre.
///
/// The RNG only seeds the breath noise of the flute; other timbres are fully
/// deterministic.
pub fn render<R: RngCore + ?Sized>(
    frequency: f64,
    duration: f32,
    timbre: Timbre,
    sample_rate: f32,
    rng: &mut R,
) -> ToneVoice {
    let f = frequency as f32;
    match timbre {
        Timbre::Sine => ToneVoice::oscillator(Waveform::Sine, f, duration, 0.5, sample_rate),
        Timbre::Sawtooth => ToneVoice::oscillator(Waveform::Sawtooth, f, duration, 0.5, sample_rate),
        Timbre::Square => ToneVoice::oscillator(Waveform::Square, f, duration, 0.5, sample_rate),
        Timbre::Triangle => ToneVoice::oscillator(Waveform::Triangle, f, duration, 0.5, sample_rate),
        Timbre::Piano => {
            // 10 ms strike, exponential decay to 0.001, then a 5 ms taper to exact zero.
            let layers = (1..=5)
                .map(|harmonic| {
                    let amplitude = 0.3 / (harmonic as f32).powf(0.8);
                    let envelope = Envelope::default()
                        .linear_to(amplitude, 0.01)
                        .exponential_to(0.001, duration - 0.005)
                        .linear_to(0.0, duration);
                    tone_layer(Waveform::Sine, f * harmonic as f32, envelope)
                })
                .collect();
            ToneVoice::with_layers(timbre, f, duration, sample_rate, layers)
        }
        Timbre::Violin => {
            let envelope = Envelope::default()
                .linear_to(0.4, 0.1)
                .linear_to(0.3, duration - 0.1)
                .linear_to(0.0, duration);
            let layer = Layer {
                source: Source::Tone {
                    osc: Oscillator::new(Waveform::Sawtooth),
                    frequency: f,
                    vibrato: Some((5.0, 2.0)),
                },
                envelope,
            };
            ToneVoice::with_layers(timbre, f, duration, sample_rate, vec![layer])
        }
        Timbre::Flute => {
            let body = tone_layer(Waveform::Sine, f, Envelope::trapezoid(0.3, 0.05, 0.05, duration));
            let breath = Layer {
                source: Source::Breath {
                    rng: SmallRng::seed_from_u64(rng.next_u64()),
                    gain: 0.02,
                    filter: HighPass::new(f * 2.0, sample_rate),
                },
                envelope: Envelope::trapezoid(1.0, 0.05, 0.05, duration),
            };
            ToneVoice::with_layers(timbre, f, duration, sample_rate, vec![body, breath])
        }
    }
}

/// Short cue jingles played on judgment and game over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEffect {
    /// C5 E5 G5, a rising major triad.
    Correct,
    /// G4 then F#4.
    Incorrect,
    /// C5 G4 E4 C4, descending.
    GameOver,
}

impl SoundEffect {
    /// `(frequency_hz, duration_s)` of each note, played back to back.
    pub fn notes(self) -> &'static [(f32, f32)] {
        match self {
            SoundEffect::Correct => &[(523.25, 0.1), (659.25, 0.1), (783.99, 0.4)],
            SoundEffect::Incorrect => &[(392.00, 0.1), (369.99, 0.3)],
            SoundEffect::GameOver => &[(523.25, 0.2), (392.00, 0.2), (329.63, 0.2), (261.63, 0.5)],
        }
    }

    /// Voices paired with their start offset from now.
    pub fn voices(self, sample_rate: f32) -> Vec<(Duration, ToneVoice)> {
        let mut offset = 0.0_f32;
        self.notes()
            .iter()
            .map(|&(frequency, duration)| {
                let start = Duration::from_secs_f32(offset);
                offset += duration;
                (start, ToneVoice::oscillator(Waveform::Sine, frequency, duration, 0.3, sample_rate))
            })
            .collect()
    }
}
