//! # Noise Generator
//!
//! Background masking noise, independent of the pitch events of a round. A noise
//! stream is a pre-rendered loop so the audio callback only copies samples.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::audio::AudioBackend;
use crate::error::CoreError;

/// Output gain of the noise stream relative to the tone voices.
pub const NOISE_GAIN: f32 = 0.05;

/// Length of the rendered noise loop.
pub const LOOP_SECONDS: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    #[default]
    None,
    White,
    Pink,
}

/// Paul Kellet's refined pink-noise filter: six one-pole sections plus a delayed
/// and a direct white term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinkFilter {
    b: [f64; 7],
}

impl PinkFilter {
    /// Feeds one white sample and returns the next pink sample.
    #[inline]
    pub fn process(&mut self, white: f64) -> f64 {
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        // b[6] still holds the previous white term.
        let out = (b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362) * 0.11;
        b[6] = white * 0.115926;
        out
    }
}

/// A looping noise stream ready to hand to the mixer.
#[derive(Debug, Clone)]
pub struct NoiseSource {
    kind: NoiseKind,
    samples: Vec<f32>,
    position: usize,
}

impl NoiseSource {
    /// Renders a loop of `kind` noise. `NoiseKind::None` renders an empty (silent)
    /// source.
    pub fn new<R: Rng + ?Sized>(kind: NoiseKind, sample_rate: f32, rng: &mut R) -> Self {
        let len = match kind {
            NoiseKind::None => 0,
            _ => (LOOP_SECONDS * sample_rate) as usize,
        };
        let mut pink = PinkFilter::default();
        let samples = (0..len)
            .map(|_| {
                let white: f64 = rng.gen_range(-1.0..=1.0);
                match kind {
                    NoiseKind::Pink => pink.process(white) as f32,
                    _ => white as f32,
                }
            })
            .collect();
        Self {
            kind,
            samples,
            position: 0,
        }
    }

    pub fn kind(&self) -> NoiseKind {
        self.kind
    }

    pub fn loop_len(&self) -> usize {
        self.samples.len()
    }

    /// Next raw sample (unity gain), wrapping at the end of the loop.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let out = self.samples[self.position];
        self.position = (self.position + 1) % self.samples.len();
        out
    }
}

/// Tracks the single active noise stream and drives the backend.
#[derive(Debug, Default)]
pub struct NoiseGenerator {
    active: NoiseKind,
}

impl NoiseGenerator {
    pub fn active(&self) -> NoiseKind {
        self.active
    }

    /// Replaces any running stream with `kind`; `None` only stops.
    pub fn start<B, R>(&mut self, kind: NoiseKind, backend: &mut B, rng: &mut R) -> Result<(), CoreError>
    where
        B: AudioBackend + ?Sized,
        R: Rng + ?Sized,
    {
        self.stop(backend)?;
        if kind == NoiseKind::None {
            return Ok(());
        }
        let source = NoiseSource::new(kind, backend.sample_rate(), rng);
        log::debug!("[NOISE] Starting {:?} noise ({} sample loop)", kind, source.loop_len());
        self.active = kind;
        backend.start_noise(source)
    }

    pub fn stop<B: AudioBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), CoreError> {
        if self.active == NoiseKind::None {
            return Ok(());
        }
        log::debug!("[NOISE] Stopping {:?} noise", self.active);
        self.active = NoiseKind::None;
        backend.stop_noise()
    }
}
