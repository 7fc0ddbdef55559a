//! Recording lifecycle over a [`CaptureDevice`].
//!
//! `Idle -> Recording -> Idle`. Whatever happens while stopping, the recorder
//! ends up idle and the capture stream is released.

use std::time::{Duration, Instant};

use thiserror::Error;

use crate::domain::ports::{CaptureDevice, CaptureStream, SpeechSynthesizer};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Capture device error: {0}")]
    Device(String),
}

/// Captured audio, mono samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Wall-clock time between start and stop.
    pub elapsed: Duration,
}

impl Recording {
    /// Length of the audio itself, which may differ from `elapsed`.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    started: Instant,
}

pub struct Recorder<D: CaptureDevice> {
    device: D,
    active: Option<ActiveCapture>,
}

impl<D: CaptureDevice> Recorder<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Acquire the device. On failure the recorder stays idle.
    pub fn start(&mut self) -> Result<(), RecorderError> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let stream = self.device.open().map_err(|e| {
            tracing::warn!("Could not open capture device: {}", e);
            e
        })?;
        tracing::debug!("Recording started at {} Hz", stream.sample_rate());
        self.active = Some(ActiveCapture {
            stream,
            started: Instant::now(),
        });
        Ok(())
    }

    /// Finish the recording and hand back the captured audio.
    pub fn stop(&mut self) -> Result<Recording, RecorderError> {
        let mut active = self.active.take().ok_or(RecorderError::NotRecording)?;

        let samples = active.stream.read_all();
        let sample_rate = active.stream.sample_rate();
        active.stream.release();
        let elapsed = active.started.elapsed();

        let samples = samples?;
        tracing::debug!(
            "Recording stopped: {} samples in {:.1}s",
            samples.len(),
            elapsed.as_secs_f64()
        );
        Ok(Recording {
            samples,
            sample_rate,
            elapsed,
        })
    }

    /// Abandon an in-flight recording without reading it.
    pub fn cancel(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stream.release();
            tracing::debug!("Recording cancelled");
        }
    }
}

impl<D: CaptureDevice> Drop for Recorder<D> {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Single-slot utterance queue: a new utterance always replaces the current one.
pub struct SpeechQueue<T: SpeechSynthesizer> {
    synth: T,
}

impl<T: SpeechSynthesizer> SpeechQueue<T> {
    pub fn new(synth: T) -> Self {
        Self { synth }
    }

    pub fn speak(&mut self, text: &str) {
        self.synth.cancel();
        if !text.trim().is_empty() {
            self.synth.speak(text);
        }
    }

    pub fn stop(&mut self) {
        self.synth.cancel();
    }

    pub fn is_speaking(&self) -> bool {
        self.synth.is_speaking()
    }

    pub fn synthesizer(&self) -> &T {
        &self.synth
    }

    pub fn into_inner(self) -> T {
        self.synth
    }
}
