//! # Audio Output Module
//!
//! Owns the single output sink of a session. Tone voices and noise streams are
//! rendered on the control thread and handed to a [`Mixer`] through a command
//! channel; the mixer runs inside the CPAL output callback on the device clock.
//!
//! ## Features
//! - Default output device with a preferred sample rate
//! - f32, i16 and u16 device formats
//! - Sample-accurate delayed starts for effect sequences
//! - At most one noise stream, replaced atomically
//! - Muted fallback when no device is available

use std::time::Duration;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::noise::{NOISE_GAIN, NoiseSource};
use crate::synth::ToneVoice;

/// Where the engine sends its sound. Implemented by [`AudioEngine`] for real
/// devices and by recording fakes in tests.
pub trait AudioBackend {
    fn sample_rate(&self) -> f32;

    /// Starts `voice` after `delay`.
    fn play(&mut self, voice: ToneVoice, delay: Duration) -> Result<(), CoreError>;

    /// Stops any running noise stream and starts `source`.
    fn start_noise(&mut self, source: NoiseSource) -> Result<(), CoreError>;

    fn stop_noise(&mut self) -> Result<(), CoreError>;
}

/// Commands from the control thread to the mixer.
#[derive(Debug)]
pub enum AudioCommand {
    Play { voice: ToneVoice, delay_frames: u64 },
    StartNoise(NoiseSource),
    StopNoise,
}

/// Sums scheduled voices and the active noise stream into output frames.
#[derive(Debug)]
pub struct Mixer {
    commands: Receiver<AudioCommand>,
    voices: Vec<(u64, ToneVoice)>,
    noise: Option<NoiseSource>,
    master_gain: f32,
    frame: u64,
}

impl Mixer {
    pub fn new(commands: Receiver<AudioCommand>, master_gain: f32) -> Self {
        Self {
            commands,
            voices: Vec::new(),
            noise: None,
            master_gain,
            frame: 0,
        }
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                AudioCommand::Play { voice, delay_frames } => {
                    self.voices.push((self.frame + delay_frames, voice));
                }
                AudioCommand::StartNoise(source) => self.noise = Some(source),
                AudioCommand::StopNoise => self.noise = None,
            }
        }
    }

    /// Number of voices not yet finished, including delayed ones.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn noise_active(&self) -> bool {
        self.noise.is_some()
    }

    /// Fills an interleaved buffer with `channels` channels; every channel gets the
    /// same mono signal.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        self.apply_commands();
        let channels = channels.max(1);

        for frame in out.chunks_mut(channels) {
            let mut sample = 0.0;
            for (start, voice) in self.voices.iter_mut() {
                if *start <= self.frame {
                    sample += voice.next_sample();
                }
            }
            if let Some(noise) = self.noise.as_mut() {
                sample += noise.next_sample() * NOISE_GAIN;
            }
            let sample = (sample * self.master_gain).clamp(-1.0, 1.0);
            frame.fill(sample);
            self.frame += 1;
        }

        self.voices.retain(|(_, voice)| !voice.is_finished());
    }
}

/// The process-wide audio resource: one output stream, one command queue.
pub struct AudioEngine {
    sender: Option<Sender<AudioCommand>>,
    _stream: Option<cpal::Stream>,
    sample_rate: u32,
}

impl std::fmt::Debug for AudioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEngine")
            .field("sample_rate", &self.sample_rate)
            .field("muted", &self.is_muted())
            .finish()
    }
}

impl AudioEngine {
    /// Opens the default output device and starts the mixer stream.
    ///
    /// # Returns
    /// * `Ok(engine)` - Engine with a running output stream
    /// * `Err(e)` - No device, no usable configuration, or the stream failed to start
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;

        log::info!("[AUDIO] Using audio output device: {}", device.name()?);

        let configs = device.supported_output_configs()?.collect::<Vec<_>>();
        let supported = match find_supported_config(configs, config.sample_rate) {
            Some(range) => range.with_sample_rate(cpal::SampleRate(config.sample_rate)),
            None => device.default_output_config()?,
        };

        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate().0;
        let stream_config: cpal::StreamConfig = supported.into();

        log::info!(
            "[AUDIO] Selected {} Hz, {} channel(s), {:?}",
            sample_rate,
            stream_config.channels,
            sample_format
        );

        let (sender, receiver) = crossbeam_channel::unbounded();
        let mixer = Mixer::new(receiver, config.master_gain);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, mixer)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, mixer)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, mixer)?,
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        };
        stream.play()?;

        Ok(Self {
            sender: Some(sender),
            _stream: Some(stream),
            sample_rate,
        })
    }

    /// Like [`AudioEngine::open`], but degrades to a muted engine on failure.
    pub fn open_or_muted(config: &EngineConfig) -> Self {
        match Self::open(config) {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("[AUDIO] Output unavailable, continuing muted: {}", e);
                Self::muted(config.sample_rate)
            }
        }
    }

    /// An engine with no device. Every call reports `AudioBackendUnavailable`.
    pub fn muted(sample_rate: u32) -> Self {
        Self {
            sender: None,
            _stream: None,
            sample_rate,
        }
    }

    /// An engine whose mixer is pulled by the caller instead of a device.
    pub fn offline(sample_rate: u32, master_gain: f32) -> (Self, Mixer) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let engine = Self {
            sender: Some(sender),
            _stream: None,
            sample_rate,
        };
        (engine, Mixer::new(receiver, master_gain))
    }

    pub fn is_muted(&self) -> bool {
        self.sender.is_none()
    }

    fn send(&self, command: AudioCommand) -> Result<(), CoreError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| CoreError::AudioBackendUnavailable("no output device".to_string()))?;
        sender
            .send(command)
            .map_err(|_| CoreError::AudioBackendUnavailable("mixer disconnected".to_string()))
    }
}

impl AudioBackend for AudioEngine {
    fn sample_rate(&self) -> f32 {
        self.sample_rate as f32
    }

    fn play(&mut self, voice: ToneVoice, delay: Duration) -> Result<(), CoreError> {
        let delay_frames = (delay.as_secs_f64() * self.sample_rate as f64).round() as u64;
        self.send(AudioCommand::Play { voice, delay_frames })
    }

    fn start_noise(&mut self, source: NoiseSource) -> Result<(), CoreError> {
        self.send(AudioCommand::StartNoise(source))
    }

    fn stop_noise(&mut self) -> Result<(), CoreError> {
        self.send(AudioCommand::StopNoise)
    }
}

fn build_stream<T>(device: &cpal::Device, config: &cpal::StreamConfig, mut mixer: Mixer) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    // Grows to the largest callback size once, then is reused.
    let mut scratch: Vec<f32> = Vec::with_capacity(4096);

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.render(&mut scratch, channels);
            for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                *out = T::from_sample(sample);
            }
        },
        |err| log::error!("[AUDIO] An error occurred on the output stream: {}", err),
        None,
    )?;
    Ok(stream)
}

/// Picks an f32 output configuration that can run at `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
}
