//! Microphone capture session.
//!
//! Buffers microphone PCM while a recording is open and returns WAV-encoded
//! audio plus loudness metrics on stop, so the session can skip
//! transcription of likely-silent takes.

use crate::{AppError, AppResult};

use std::{
    collections::VecDeque,
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use cpal::{
    Device, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use tracing::{debug, error, info, instrument};

/// Maximum samples to buffer (5 minutes at 48kHz mono).
/// Prevents unbounded memory growth during long recordings.
const MAX_BUFFER_SAMPLES: usize = 48_000 * 60 * 5;

/// Upper bound on waiting for the audio callback to drain on stop.
const CAPTURE_DRAIN_LIMIT: Duration = Duration::from_millis(600);

/// Peak amplitude below which a take counts as silence.
const SILENCE_PEAK_THRESHOLD: f32 = 0.015;

/// Takes shorter than this cannot contain speech worth transcribing.
const MIN_SPEECH_DURATION: Duration = Duration::from_millis(300);

/// Encoded audio and loudness metrics returned by a stopped capture.
#[derive(Debug, Clone)]
pub struct CapturedAudio {
    /// WAV-encoded mono PCM.
    pub wav_bytes: Vec<u8>,
    /// Length of the captured take.
    pub duration: Duration,
    /// Largest absolute sample value observed, in `[0, 1]`.
    pub peak_amplitude: f32,
}

impl CapturedAudio {
    /// True when the metrics indicate no speech was captured.
    pub fn is_likely_silence(&self) -> bool {
        self.peak_amplitude < SILENCE_PEAK_THRESHOLD || self.duration < MIN_SPEECH_DURATION
    }
}

/// An audio capture session the dictation state machine drives.
///
/// `stop` must drain and return within [`CAPTURE_DRAIN_LIMIT`].
pub trait CaptureSession: Send {
    /// Begin buffering microphone PCM.
    fn start(&mut self) -> AppResult<()>;

    /// Stop capturing and return the encoded take with its metrics.
    fn stop(&mut self) -> AppResult<CapturedAudio>;

    /// Stop capturing and discard everything buffered so far.
    fn abort(&mut self);
}

/// Default capture backed by the system's default input device.
pub struct MicCapture {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    samples: Arc<Mutex<VecDeque<f32>>>,
    /// Signals the audio callback to stop writing. Set to `true` before
    /// dropping the stream so no in-flight callback writes after the lock
    /// is acquired in `stop()`.
    shutdown: Arc<AtomicBool>,
}

impl MicCapture {
    /// Resolve the default input device and its configuration.
    #[track_caller]
    #[instrument]
    pub fn new() -> AppResult<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| AppError::CaptureFailed {
                reason: "No microphone found".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let config = device
            .default_input_config()
            .map_err(|e| AppError::CaptureFailed {
                reason: format!("Failed to get device config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        info!(
            sample_rate = config.sample_rate(),
            channels = config.channels(),
            "MicCapture initialized"
        );

        Ok(Self {
            device,
            config: config.into(),
            stream: None,
            samples: Arc::new(Mutex::new(VecDeque::new())),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Tear down the stream and collect buffered samples, bounded by the
    /// drain limit.
    #[track_caller]
    fn drain(&mut self) -> AppResult<Vec<f32>> {
        self.shutdown.store(true, Ordering::Release);

        let deadline = Instant::now() + CAPTURE_DRAIN_LIMIT;
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }

        // The callback may still hold the buffer lock for one final write.
        loop {
            match self.samples.try_lock() {
                Ok(mut buf) => {
                    let samples: Vec<f32> = buf.drain(..).collect();
                    return Ok(samples);
                }
                Err(std::sync::TryLockError::Poisoned(e)) => {
                    // The data behind a poisoned lock is still usable.
                    error!("Sample buffer lock poisoned, recovering");
                    let samples: Vec<f32> = e.into_inner().drain(..).collect();
                    return Ok(samples);
                }
                Err(std::sync::TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(AppError::CaptureFailed {
                            reason: "Capture did not drain within its stop window".to_string(),
                            location: ErrorLocation::from(Location::caller()),
                        });
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

impl CaptureSession for MicCapture {
    #[instrument(skip(self))]
    fn start(&mut self) -> AppResult<()> {
        let samples = Arc::clone(&self.samples);
        let shutdown = Arc::clone(&self.shutdown);

        self.shutdown.store(false, Ordering::Release);

        {
            let mut buf = samples.lock().unwrap_or_else(|e| e.into_inner());
            buf.clear();
        }

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if shutdown.load(Ordering::Acquire) {
                        return;
                    }
                    let mut buf = samples.lock().unwrap_or_else(|e| {
                        error!("Sample buffer lock poisoned, recovering");
                        e.into_inner()
                    });
                    buf.extend(data.iter().copied());
                    while buf.len() > MAX_BUFFER_SAMPLES {
                        buf.pop_front();
                    }
                },
                |err| {
                    error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AppError::CaptureFailed {
                reason: format!("Failed to build stream: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        stream.play().map_err(|e| AppError::CaptureFailed {
            reason: format!("Failed to start stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        self.stream = Some(stream);
        info!("Audio capture started");

        Ok(())
    }

    #[instrument(skip(self))]
    fn stop(&mut self) -> AppResult<CapturedAudio> {
        let samples = self.drain()?;

        let channels = self.config.channels.max(1) as usize;
        let sample_rate = self.config.sample_rate;

        let mono = downmix(&samples, channels);
        let peak_amplitude = mono.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        let duration = Duration::from_secs_f64(mono.len() as f64 / f64::from(sample_rate));
        let wav_bytes = encode_wav(&mono, sample_rate);

        debug!(
            frames = mono.len(),
            peak = peak_amplitude,
            duration_ms = duration.as_millis(),
            "Capture stopped"
        );

        Ok(CapturedAudio {
            wav_bytes,
            duration,
            peak_amplitude,
        })
    }

    fn abort(&mut self) {
        if let Err(e) = self.drain() {
            error!(error = ?e, "Failed to drain aborted capture");
        }
        debug!("Capture aborted, audio discarded");
    }
}

/// Average interleaved channels down to mono frames.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Encode mono f32 samples as 16-bit PCM WAV.
fn encode_wav(mono: &[f32], sample_rate: u32) -> Vec<u8> {
    let data_len = (mono.len() * 2) as u32;
    let mut wav = Vec::with_capacity(44 + mono.len() * 2);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    wav.extend_from_slice(&2u16.to_le_bytes()); // block align
    wav.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    for sample in mono {
        let clamped = sample.clamp(-1.0, 1.0);
        wav.extend_from_slice(&((clamped * i16::MAX as f32) as i16).to_le_bytes());
    }

    wav
}
