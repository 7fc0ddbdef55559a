use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::scorer::{AnalysisError, AudioAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackLevel {
    Excellent,
    Great,
    Good,
    NeedsImprovement,
    AnalysisFailed,
}

impl FeedbackLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            90..=u8::MAX => FeedbackLevel::Excellent,
            80..=89 => FeedbackLevel::Great,
            70..=79 => FeedbackLevel::Good,
            _ => FeedbackLevel::NeedsImprovement,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedbackLevel::Excellent => "Excellent",
            FeedbackLevel::Great => "Great",
            FeedbackLevel::Good => "Good",
            FeedbackLevel::NeedsImprovement => "Needs Improvement",
            FeedbackLevel::AnalysisFailed => "Analysis Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
    pub score: u8,
    pub is_error: bool,
}

impl Feedback {
    pub fn for_score(score: u8, analysis: &AudioAnalysis) -> Self {
        let level = FeedbackLevel::from_score(score);
        let message = match level {
            FeedbackLevel::Excellent if analysis.clarity > 85 => {
                "Outstanding pronunciation and clear articulation! Your clarity was exceptional and your volume stayed steady throughout."
            }
            FeedbackLevel::Excellent if analysis.consistency > 85 => {
                "Excellent consistency in your delivery! Your pace was steady and your speech patterns sounded confident."
            }
            FeedbackLevel::Excellent => {
                "Excellent overall performance! Clear pronunciation and strong reading with good volume control."
            }
            FeedbackLevel::Great if analysis.clarity > 75 => {
                "Very good reading with clear pronunciation! Work on keeping your volume consistent."
            }
            FeedbackLevel::Great if analysis.speech_rate > 150 => {
                "Great pace and rhythm! Slow down slightly for even clearer pronunciation."
            }
            FeedbackLevel::Great => {
                "Great effort overall! Clear reading with good rhythm; there is room to improve consistency."
            }
            FeedbackLevel::Good if analysis.volume_range < 0.3 => {
                "Good reading with clear content! Vary your volume more to add expression."
            }
            FeedbackLevel::Good if analysis.clarity < 70 => {
                "Good effort! Focus on clearer pronunciation and a steady pace."
            }
            FeedbackLevel::Good => {
                "Good reading overall! Work on consistent volume and pacing for a better delivery."
            }
            _ if analysis.average_volume < 0.05 => {
                "Keep practicing! Your volume was too low; speak louder and with more confidence."
            }
            _ if analysis.clarity < 60 => {
                "Focus on clear pronunciation! Slow down and enunciate each word carefully."
            }
            _ => "Good effort! Focus on consistent volume, clear pronunciation and a steady pace.",
        };

        Self {
            level,
            message: message.to_string(),
            score,
            is_error: false,
        }
    }

    pub fn analysis_failed(error: &AnalysisError) -> Self {
        Self {
            level: FeedbackLevel::AnalysisFailed,
            message: format!(
                "Unable to analyze your recording: {}. Please speak clearly and try recording again.",
                error
            ),
            score: 0,
            is_error: true,
        }
    }
}

/// Reading estimates derived from an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMetrics {
    pub word_count: u32,
    /// Words per minute.
    pub reading_speed: u32,
    pub mispronounced_words: u32,
    /// Percent of the story covered, 0-100.
    pub reading_progress: f64,
}

impl ReadingMetrics {
    pub fn estimate(analysis: &AudioAnalysis, story_word_count: u32) -> Self {
        let word_count = if analysis.speech_rate == 0 || analysis.duration <= 0.0 {
            0
        } else {
            let estimated = (analysis.speech_rate as f64 / 60.0 * analysis.duration).round() as u32;
            estimated.min(story_word_count)
        };

        let reading_speed = if word_count == 0 || analysis.duration <= 0.0 {
            0
        } else {
            (word_count as f64 / analysis.duration * 60.0).round() as u32
        };

        let mispronounced_words = if analysis.clarity == 0 || analysis.average_volume == 0.0 {
            0
        } else if analysis.clarity < 50 {
            3
        } else if analysis.clarity < 70 {
            1
        } else {
            0
        };

        let reading_progress = if story_word_count == 0 {
            0.0
        } else {
            (word_count as f64 / story_word_count as f64 * 100.0).min(100.0)
        };

        Self {
            word_count,
            reading_speed,
            mispronounced_words,
            reading_progress,
        }
    }
}

/// Metrics returned by the remote speech-analysis service. Every field is
/// optional; a missing or zero value leaves the local estimate in place.
/// The service sends plain JSON numbers, decimals included, so the
/// integer-valued metrics are read as `f64` and rounded when merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendAnalysis {
    pub duration: Option<f64>,
    pub average_volume: Option<f64>,
    pub volume_range: Option<f64>,
    pub max_volume: Option<f64>,
    pub speech_rate: Option<f64>,
    pub clarity: Option<f64>,
    pub consistency: Option<f64>,
    pub energy: Option<f64>,
    pub speech_segments: Option<f64>,
    pub pronunciation_score: Option<f64>,
    pub fluency_score: Option<f64>,
    pub intonation_score: Option<f64>,
    pub stress_pattern_score: Option<f64>,
    pub word_accuracy: Option<f64>,
    pub confidence_level: Option<f64>,
    pub suggested_improvements: Vec<String>,
    pub detected_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetrics {
    pub pronunciation_score: f64,
    pub fluency_score: f64,
    pub intonation_score: f64,
    pub stress_pattern_score: f64,
    pub word_accuracy: f64,
    pub confidence_level: f64,
    pub suggested_improvements: Vec<String>,
    pub detected_issues: Vec<String>,
}

fn usable(remote: Option<f64>) -> Option<f64> {
    remote.filter(|v| v.is_finite() && *v != 0.0)
}

fn pick_f64(remote: Option<f64>, local: f64) -> f64 {
    usable(remote).unwrap_or(local)
}

/// Rounded to a whole count. A value that rounds to zero keeps the local one.
fn pick_count(remote: Option<f64>, local: u32) -> u32 {
    usable(remote)
        .map(|v| v.round().clamp(0.0, u32::MAX as f64) as u32)
        .filter(|v| *v != 0)
        .unwrap_or(local)
}

/// Rounded and clamped to 0-100.
fn pick_score(remote: Option<f64>, local: u8) -> u8 {
    usable(remote)
        .map(|v| v.round().clamp(0.0, 100.0) as u8)
        .filter(|v| *v != 0)
        .unwrap_or(local)
}

/// Merge the service result over the local analysis.
pub fn combine(local: &AudioAnalysis, remote: Option<&BackendAnalysis>) -> (AudioAnalysis, ServiceMetrics) {
    let Some(remote) = remote else {
        return (local.clone(), ServiceMetrics::default());
    };

    let merged = AudioAnalysis {
        duration: pick_f64(remote.duration, local.duration),
        sample_rate: local.sample_rate,
        average_volume: pick_f64(remote.average_volume, local.average_volume),
        max_volume: pick_f64(remote.max_volume, local.max_volume),
        volume_range: pick_f64(remote.volume_range, local.volume_range),
        speech_rate: pick_count(remote.speech_rate, local.speech_rate),
        clarity: pick_score(remote.clarity, local.clarity),
        consistency: pick_score(remote.consistency, local.consistency),
        energy: pick_score(remote.energy, local.energy),
        speech_segments: pick_count(remote.speech_segments, local.speech_segments),
    };

    let metrics = ServiceMetrics {
        pronunciation_score: remote.pronunciation_score.unwrap_or_default(),
        fluency_score: remote.fluency_score.unwrap_or_default(),
        intonation_score: remote.intonation_score.unwrap_or_default(),
        stress_pattern_score: remote.stress_pattern_score.unwrap_or_default(),
        word_accuracy: remote.word_accuracy.unwrap_or_default(),
        confidence_level: remote.confidence_level.unwrap_or_default(),
        suggested_improvements: remote.suggested_improvements.clone(),
        detected_issues: remote.detected_issues.clone(),
    };

    (merged, metrics)
}

/// Outcome of evaluating one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Evaluation {
    Scored {
        score: u8,
        feedback: Feedback,
        analysis: AudioAnalysis,
        metrics: ReadingMetrics,
        service: ServiceMetrics,
        timestamp: DateTime<Utc>,
    },
    Failed {
        feedback: Feedback,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl Evaluation {
    pub fn score(&self) -> Option<u8> {
        match self {
            Evaluation::Scored { score, .. } => Some(*score),
            Evaluation::Failed { .. } => None,
        }
    }

    pub fn feedback(&self) -> &Feedback {
        match self {
            Evaluation::Scored { feedback, .. } | Evaluation::Failed { feedback, .. } => feedback,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Evaluation::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_analysis() -> AudioAnalysis {
        AudioAnalysis {
            duration: 30.0,
            sample_rate: 16_000,
            average_volume: 0.06,
            max_volume: 0.5,
            volume_range: 0.5,
            speech_rate: 120,
            clarity: 90,
            consistency: 80,
            energy: 75,
            speech_segments: 12,
        }
    }

    #[test]
    fn test_levels_by_range() {
        assert_eq!(FeedbackLevel::from_score(100), FeedbackLevel::Excellent);
        assert_eq!(FeedbackLevel::from_score(90), FeedbackLevel::Excellent);
        assert_eq!(FeedbackLevel::from_score(85), FeedbackLevel::Great);
        assert_eq!(FeedbackLevel::from_score(70), FeedbackLevel::Good);
        assert_eq!(FeedbackLevel::from_score(69), FeedbackLevel::NeedsImprovement);
        assert_eq!(FeedbackLevel::from_score(0), FeedbackLevel::NeedsImprovement);
    }

    #[test]
    fn test_message_follows_dominant_metric() {
        let analysis = sample_analysis();
        let excellent = Feedback::for_score(95, &analysis);
        assert!(excellent.message.contains("articulation"));
        assert!(!excellent.is_error);

        let quiet = AudioAnalysis {
            average_volume: 0.01,
            ..analysis
        };
        let weak = Feedback::for_score(40, &quiet);
        assert_eq!(weak.level, FeedbackLevel::NeedsImprovement);
        assert!(weak.message.contains("too low"));
    }

    #[test]
    fn test_failure_feedback_has_no_score() {
        let feedback = Feedback::analysis_failed(&AnalysisError::SilenceDetected);
        assert!(feedback.is_error);
        assert_eq!(feedback.score, 0);
        assert_eq!(feedback.level.label(), "Analysis Failed");
        assert!(feedback.message.contains("silence"));
    }

    #[test]
    fn test_reading_metrics() {
        let metrics = ReadingMetrics::estimate(&sample_analysis(), 100);
        // 120 wpm over 30s
        assert_eq!(metrics.word_count, 60);
        assert_eq!(metrics.reading_speed, 120);
        assert_eq!(metrics.mispronounced_words, 0);
        assert!((metrics.reading_progress - 60.0).abs() < 1e-9);

        let capped = ReadingMetrics::estimate(&sample_analysis(), 40);
        assert_eq!(capped.word_count, 40);
        assert!((capped.reading_progress - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_mispronunciation_bands() {
        let unclear = AudioAnalysis {
            clarity: 45,
            ..sample_analysis()
        };
        assert_eq!(ReadingMetrics::estimate(&unclear, 100).mispronounced_words, 3);

        let fair = AudioAnalysis {
            clarity: 65,
            ..sample_analysis()
        };
        assert_eq!(ReadingMetrics::estimate(&fair, 100).mispronounced_words, 1);
    }

    #[test]
    fn test_combine_prefers_nonzero_remote_values() {
        let local = sample_analysis();
        let remote = BackendAnalysis {
            clarity: Some(70.0),
            consistency: Some(0.0),
            pronunciation_score: Some(88.0),
            detected_issues: vec!["lisp".to_string()],
            ..Default::default()
        };

        let (merged, service) = combine(&local, Some(&remote));
        assert_eq!(merged.clarity, 70);
        assert_eq!(merged.consistency, local.consistency);
        assert_eq!(merged.speech_rate, local.speech_rate);
        assert_eq!(service.pronunciation_score, 88.0);
        assert_eq!(service.detected_issues, vec!["lisp".to_string()]);

        let (alone, empty) = combine(&local, None);
        assert_eq!(alone, local);
        assert_eq!(empty, ServiceMetrics::default());
    }

    #[test]
    fn test_combine_rounds_decimal_remote_metrics() {
        let local = sample_analysis();
        let remote: BackendAnalysis = serde_json::from_value(serde_json::json!({
            "clarity": 81.5,
            "energy": 140.2,
            "consistency": 0.4,
            "speechRate": 3.4,
            "speechSegments": 7.6,
            "duration": 12.25,
            "pronunciationScore": 77
        }))
        .unwrap();

        let (merged, service) = combine(&local, Some(&remote));
        assert_eq!(merged.clarity, 82);
        assert_eq!(merged.energy, 100);
        // rounds to zero, local value stays
        assert_eq!(merged.consistency, local.consistency);
        assert_eq!(merged.speech_rate, 3);
        assert_eq!(merged.speech_segments, 8);
        assert_eq!(merged.duration, 12.25);
        assert_eq!(service.pronunciation_score, 77.0);
    }
}
