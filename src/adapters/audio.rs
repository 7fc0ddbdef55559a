//! WAV decoding/encoding and a file-backed capture device.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::core::recorder::RecorderError;
use crate::domain::ports::{CaptureDevice, CaptureStream};
use crate::utils::error::Result;

/// Decoded audio: mono samples in [-1, 1] and the sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

fn decode<R: Read>(mut reader: WavReader<R>) -> Result<MonoAudio> {
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    tracing::debug!(
        "Decoded {} mono samples at {} Hz ({} channel(s), {}-bit {:?})",
        samples.len(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

pub fn read_wav(path: impl AsRef<Path>) -> Result<MonoAudio> {
    decode(WavReader::open(path)?)
}

pub fn decode_wav(bytes: &[u8]) -> Result<MonoAudio> {
    decode(WavReader::new(Cursor::new(bytes))?)
}

/// 16-bit mono PCM, the format the speech-analysis service accepts.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

fn capture_error(error: hound::Error) -> RecorderError {
    match error {
        hound::Error::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            RecorderError::PermissionDenied(e.to_string())
        }
        other => RecorderError::Device(other.to_string()),
    }
}

/// Capture device that "records" a WAV file from disk.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CaptureDevice for FileCapture {
    fn open(&self) -> std::result::Result<Box<dyn CaptureStream>, RecorderError> {
        let reader = WavReader::open(&self.path).map_err(capture_error)?;
        let audio = decode(reader).map_err(|e| RecorderError::Device(e.to_string()))?;
        Ok(Box::new(BufferedStream::new(audio)))
    }
}

/// Capture stream over audio that is already in memory.
#[derive(Debug)]
pub struct BufferedStream {
    audio: Option<MonoAudio>,
    sample_rate: u32,
}

impl BufferedStream {
    pub fn new(audio: MonoAudio) -> Self {
        Self {
            sample_rate: audio.sample_rate,
            audio: Some(audio),
        }
    }
}

impl CaptureStream for BufferedStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn read_all(&mut self) -> std::result::Result<Vec<f32>, RecorderError> {
        self.audio
            .take()
            .map(|a| a.samples)
            .ok_or_else(|| RecorderError::Device("capture stream already drained".to_string()))
    }

    fn release(&mut self) {
        self.audio = None;
    }
}
