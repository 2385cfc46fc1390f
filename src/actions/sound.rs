//! Sound effects played on a dedicated thread
//!
//! Each player is either idle or playing. `play` spawns an OS thread that owns
//! the output stream until the sound ends or the player is stopped.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const WAIT_STEP: Duration = Duration::from_millis(10);

/// Interleaved samples in `[-1, 1]`
#[derive(Debug, Clone)]
pub struct DecodedSound {
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode a WAV file with hound
pub fn decode_wav(path: &Path) -> Result<DecodedSound> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float samples")?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read int samples")?
        }
    };

    Ok(DecodedSound {
        samples: samples.into(),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Play a sound once; returns `true` if it reached its end, `false` if
/// `keep_playing` turned false first
fn play_once(sound: &DecodedSound, keep_playing: &dyn Fn() -> bool) -> Result<bool> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("No audio output device"))?;
    let config = cpal::StreamConfig {
        channels: sound.channels,
        sample_rate: cpal::SampleRate(sound.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let samples = sound.samples.clone();
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let position = position.clone();
        let finished = finished.clone();
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let start = position.load(Ordering::Relaxed);
                    let end = (start + data.len()).min(samples.len());
                    let written = end - start;
                    data[..written].copy_from_slice(&samples[start..end]);
                    data[written..].fill(0.0);
                    position.store(end, Ordering::Relaxed);
                    if end == samples.len() {
                        finished.store(true, Ordering::Release);
                    }
                },
                |e| warn!("Sound output error: {}", e),
                None,
            )
            .context("Failed to build output stream")?
    };
    stream.play().context("Failed to start output stream")?;

    loop {
        if finished.load(Ordering::Acquire) {
            // Let the device drain the last buffer
            std::thread::sleep(WAIT_STEP);
            return Ok(true);
        }
        if !keep_playing() {
            return Ok(false);
        }
        std::thread::sleep(WAIT_STEP);
    }
}

#[derive(Debug, Default)]
struct PlaybackState {
    playing: AtomicBool,
    /// Bumped by every `play`; a thread only runs while its generation is current
    generation: AtomicU64,
}

/// One sound effect
pub struct SoundPlayer {
    path: PathBuf,
    looping: bool,
    state: Arc<PlaybackState>,
}

impl SoundPlayer {
    pub fn new(path: impl Into<PathBuf>, looping: bool) -> Self {
        Self {
            path: path.into(),
            looping,
            state: Arc::new(PlaybackState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing.load(Ordering::SeqCst)
    }

    /// Start playing on a new thread, replacing a playback in progress
    pub fn play(&self) {
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.playing.store(true, Ordering::SeqCst);

        let state = self.state.clone();
        let path = self.path.clone();
        let looping = self.looping;
        let spawned = std::thread::Builder::new()
            .name("sound-player".into())
            .spawn(move || {
                let keep_playing = || {
                    state.playing.load(Ordering::SeqCst)
                        && state.generation.load(Ordering::SeqCst) == generation
                };

                let result = decode_wav(&path).and_then(|sound| {
                    while play_once(&sound, &keep_playing)? && looping && keep_playing() {
                        debug!("Looping {}", path.display());
                    }
                    Ok(())
                });
                if let Err(e) = result {
                    warn!("Failed to play {}: {:#}", path.display(), e);
                }

                if state.generation.load(Ordering::SeqCst) == generation {
                    state.playing.store(false, Ordering::SeqCst);
                }
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn sound thread: {}", e);
            self.state.playing.store(false, Ordering::SeqCst);
        }
    }

    /// Stop playback; returns whether something was playing
    pub fn stop(&self) -> bool {
        self.state.playing.swap(false, Ordering::SeqCst)
    }

    /// Stop if playing, play otherwise
    pub fn toggle(&self) {
        if !self.stop() {
            self.play();
        }
    }
}
