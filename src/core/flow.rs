//! The storytelling attempt: record a story being read aloud, score it and
//! log the result.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::adapters::audio::encode_wav;
use crate::adapters::http::ApiClient;
use crate::core::feedback::{combine, BackendAnalysis, Evaluation, Feedback, ReadingMetrics};
use crate::core::history::{History, PracticeSession};
use crate::core::recorder::{Recorder, Recording};
use crate::core::scorer::{AnalysisError, SpeechScorer};
use crate::domain::model::{ExerciseResult, ProgressUpdate, Story};
use crate::domain::ports::{CaptureDevice, PracticeFlow, Storage};
use crate::utils::error::Result;

pub const STORYTELLING: &str = "storytelling";

/// Remote collaborators of a flow: the API client and the user it acts for.
pub struct ServiceLink {
    pub client: ApiClient,
    pub user_id: String,
}

pub struct StorytellingFlow<D: CaptureDevice, S: Storage> {
    recorder: Mutex<Recorder<D>>,
    scorer: SpeechScorer,
    history: History<S>,
    story: Option<Story>,
    service: Option<ServiceLink>,
    hold: Duration,
}

impl<D: CaptureDevice, S: Storage> StorytellingFlow<D, S> {
    pub fn new(device: D, scorer: SpeechScorer, history: History<S>) -> Self {
        Self {
            recorder: Mutex::new(Recorder::new(device)),
            scorer,
            history,
            story: None,
            service: None,
            hold: Duration::ZERO,
        }
    }

    pub fn with_story(mut self, story: Story) -> Self {
        self.story = Some(story);
        self
    }

    /// Use the speech-analysis and progress services.
    pub fn with_service(mut self, client: ApiClient, user_id: impl Into<String>) -> Self {
        self.service = Some(ServiceLink {
            client,
            user_id: user_id.into(),
        });
        self
    }

    /// How long the device stays open between start and stop.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub fn history(&self) -> &History<S> {
        &self.history
    }

    fn failed(error: AnalysisError) -> Evaluation {
        tracing::warn!("Recording rejected: {}", error);
        Evaluation::Failed {
            feedback: Feedback::analysis_failed(&error),
            reason: error.to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn remote_analysis(&self, recording: &Recording) -> Option<BackendAnalysis> {
        let service = self.service.as_ref()?;
        let wav = match encode_wav(&recording.samples, recording.sample_rate) {
            Ok(wav) => wav,
            Err(e) => {
                tracing::warn!("Could not encode recording for upload: {}", e);
                return None;
            }
        };
        service.client.analyze_speech(&wav, self.story.as_ref()).await
    }
}

#[async_trait]
impl<D: CaptureDevice, S: Storage> PracticeFlow for StorytellingFlow<D, S> {
    async fn capture(&self) -> Result<Recording> {
        let mut recorder = self.recorder.lock().await;
        recorder.start()?;
        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }
        Ok(recorder.stop()?)
    }

    async fn evaluate(&self, recording: Recording) -> Result<Evaluation> {
        let local = match self.scorer.analyze(&recording.samples, recording.sample_rate) {
            Ok(analysis) => analysis,
            Err(e) => return Ok(Self::failed(e)),
        };

        let remote = self.remote_analysis(&recording).await;
        let (analysis, service) = combine(&local, remote.as_ref());

        let score = match self.scorer.score(&analysis) {
            Ok(score) => score,
            Err(e) => return Ok(Self::failed(e)),
        };

        let word_count = self.story.as_ref().map_or(0, Story::word_count);
        Ok(Evaluation::Scored {
            score,
            feedback: Feedback::for_score(score, &analysis),
            metrics: ReadingMetrics::estimate(&analysis, word_count),
            analysis,
            service,
            timestamp: Utc::now(),
        })
    }

    async fn report(&self, evaluation: &Evaluation) -> Result<()> {
        let Evaluation::Scored {
            score,
            analysis,
            timestamp,
            ..
        } = evaluation
        else {
            tracing::debug!("Failed attempt is not logged");
            return Ok(());
        };

        let session = PracticeSession {
            exercise_type: STORYTELLING.to_string(),
            score: *score,
            duration_minutes: (analysis.duration / 60.0).round() as u32,
            points: *score as u32 / 10,
            timestamp: *timestamp,
        };
        self.history.record(session.clone()).await?;

        let progress = self.history.progress(timestamp.date_naive()).await?;
        self.history.check_achievements(&progress, *timestamp).await?;

        if let Some(service) = &self.service {
            let update = ProgressUpdate {
                user_id: service.user_id.clone(),
                exercise_data: ExerciseResult {
                    exercise_type: session.exercise_type,
                    score: session.score,
                    duration: session.duration_minutes,
                    points: session.points,
                    timestamp: session.timestamp,
                },
            };
            if let Err(e) = service.client.update_progress(&update).await {
                tracing::warn!("Progress update failed, kept locally only: {}", e);
            }
        }

        Ok(())
    }
}
