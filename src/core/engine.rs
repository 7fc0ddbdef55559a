use crate::core::feedback::Evaluation;
use crate::core::PracticeFlow;
use crate::utils::error::Result;

pub struct PracticeEngine<F: PracticeFlow> {
    flow: F,
}

impl<F: PracticeFlow> PracticeEngine<F> {
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// One attempt: capture, evaluate, report. A failed analysis is still
    /// reported; errors from capture or evaluation abort the attempt.
    pub async fn run(&self) -> Result<Evaluation> {
        tracing::info!("Starting practice attempt");

        // Capture
        let recording = self.flow.capture().await?;
        tracing::info!(
            "Captured {:.1}s of audio at {} Hz",
            recording.duration_secs(),
            recording.sample_rate
        );

        // Evaluate
        let evaluation = self.flow.evaluate(recording).await?;
        match evaluation.score() {
            Some(score) => tracing::info!("Attempt scored {}/100", score),
            None => tracing::warn!("Analysis failed: {}", evaluation.feedback().message),
        }

        // Report
        self.flow.report(&evaluation).await?;
        tracing::info!("Practice attempt complete");

        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::feedback::Feedback;
    use crate::core::recorder::{RecorderError, Recording};
    use crate::core::scorer::AnalysisError;
    use crate::utils::error::PracticeError;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedFlow {
        deny_microphone: bool,
        reports: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PracticeFlow for ScriptedFlow {
        async fn capture(&self) -> Result<Recording> {
            if self.deny_microphone {
                return Err(RecorderError::PermissionDenied("blocked".to_string()).into());
            }
            Ok(Recording {
                samples: vec![0.0; 8000],
                sample_rate: 8000,
                elapsed: Duration::from_secs(1),
            })
        }

        async fn evaluate(&self, _recording: Recording) -> Result<Evaluation> {
            let error = AnalysisError::SilenceDetected;
            Ok(Evaluation::Failed {
                feedback: Feedback::analysis_failed(&error),
                reason: error.to_string(),
                timestamp: Utc::now(),
            })
        }

        async fn report(&self, _evaluation: &Evaluation) -> Result<()> {
            self.reports.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_analysis_is_reported_without_score() {
        let engine = PracticeEngine::new(ScriptedFlow::default());
        let evaluation = engine.run().await.unwrap();
        assert!(evaluation.is_failure());
        assert_eq!(evaluation.score(), None);
        assert_eq!(engine.flow().reports.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capture_error_stops_attempt() {
        let engine = PracticeEngine::new(ScriptedFlow {
            deny_microphone: true,
            ..Default::default()
        });
        let err = engine.run().await.unwrap_err();
        assert!(matches!(
            err,
            PracticeError::Recorder(RecorderError::PermissionDenied(_))
        ));
        assert_eq!(engine.flow().reports.load(Ordering::SeqCst), 0);
    }
}
