use crate::core::feedback::Evaluation;
use crate::core::recorder::{RecorderError, Recording};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Key/value persistence for session and history data.
pub trait Storage: Send + Sync {
    /// `Ok(None)` when the key has never been written or was removed.
    fn read_file(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        key: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn base_url(&self) -> &str;
    fn data_dir(&self) -> &str;
    fn request_timeout_secs(&self) -> u64;
    fn page_size(&self) -> usize;
}

/// An open audio input, e.g. a microphone track.
pub trait CaptureStream: Send {
    fn sample_rate(&self) -> u32;
    /// Drain everything captured so far as mono samples in [-1, 1].
    fn read_all(&mut self) -> std::result::Result<Vec<f32>, RecorderError>;
    /// Stop the underlying tracks. Idempotent.
    fn release(&mut self);
}

pub trait CaptureDevice: Send + Sync {
    fn open(&self) -> std::result::Result<Box<dyn CaptureStream>, RecorderError>;
}

/// Text-to-speech output with a single global utterance queue. Conversation
/// replies are read aloud through it (`adapters::speech` wraps a TTS command).
pub trait SpeechSynthesizer: Send {
    fn cancel(&mut self);
    fn speak(&mut self, text: &str);
    fn is_speaking(&self) -> bool;
}

#[async_trait]
pub trait PracticeFlow: Send + Sync {
    async fn capture(&self) -> Result<Recording>;
    async fn evaluate(&self, recording: Recording) -> Result<Evaluation>;
    async fn report(&self, evaluation: &Evaluation) -> Result<()>;
}
