//! Heuristic speech scorer.
//!
//! Derives a 0-100 performance score from raw amplitude statistics of a mono
//! clip. There is no speech recognition here: every sub-score is a strided
//! pass over the samples mapped through a fixed threshold table. Silent or
//! near-silent clips are rejected with an [`AnalysisError`] instead of being
//! given a number.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("no audio data to analyze")]
    EmptyRecording,

    #[error("recording is too short ({duration_secs:.2}s)")]
    TooShort { duration_secs: f64 },

    #[error("recording contains only silence or background noise")]
    SilenceDetected,

    #[error("not enough speech detected ({segments} segments, {speech_ratio:.2} speech ratio)")]
    InsufficientSpeech { segments: u32, speech_ratio: f64 },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Strides and thresholds of the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerSettings {
    /// Stride of the content gate.
    pub gate_stride: usize,
    /// Silence threshold of the content gate.
    pub gate_threshold: f32,
    pub min_duration_secs: f64,
    pub min_speech_ratio: f64,
    pub min_segments: u32,
    /// Stride of the volume and segment pass.
    pub volume_stride: usize,
    /// Silence threshold for every analysis pass.
    pub silence_threshold: f32,
    pub clarity_stride: usize,
    pub consistency_stride: usize,
    pub consistency_jump: f32,
    pub energy_stride: usize,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        Self {
            gate_stride: 500,
            gate_threshold: 0.003,
            min_duration_secs: 0.5,
            min_speech_ratio: 0.1,
            min_segments: 2,
            volume_stride: 100,
            silence_threshold: 0.005,
            clarity_stride: 500,
            consistency_stride: 2000,
            consistency_jump: 0.03,
            energy_stride: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnalysis {
    pub duration: f64,
    pub sample_rate: u32,
    pub average_volume: f64,
    pub max_volume: f64,
    pub volume_range: f64,
    /// Estimated words per minute, 0 when fewer than two segments were found.
    pub speech_rate: u32,
    pub clarity: u8,
    pub consistency: u8,
    pub energy: u8,
    pub speech_segments: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SpeechScorer {
    settings: ScorerSettings,
}

impl SpeechScorer {
    pub fn new(settings: ScorerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ScorerSettings {
        &self.settings
    }

    /// Rejects clips without usable speech.
    pub fn check_content(&self, samples: &[f32], sample_rate: u32) -> Result<(), AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidSampleRate(sample_rate));
        }
        if samples.is_empty() {
            return Err(AnalysisError::EmptyRecording);
        }

        let s = &self.settings;
        let duration = samples.len() as f64 / sample_rate as f64;
        if duration <= s.min_duration_secs {
            return Err(AnalysisError::TooShort {
                duration_secs: duration,
            });
        }

        let stride = s.gate_stride.max(1);
        let mut sum_squares = 0.0_f64;
        let mut speech_samples = 0_usize;
        let segments = count_transitions(samples, stride, s.gate_threshold);

        for &x in samples.iter().step_by(stride) {
            let sample = x.abs() as f64;
            sum_squares += sample * sample;
            if x.abs() > s.gate_threshold {
                speech_samples += 1;
            }
        }

        let strided_len = samples.len() as f64 / stride as f64;
        let rms = (sum_squares / strided_len).sqrt();
        if rms <= s.gate_threshold as f64 {
            return Err(AnalysisError::SilenceDetected);
        }

        let speech_ratio = speech_samples as f64 / strided_len;
        if segments < s.min_segments || speech_ratio <= s.min_speech_ratio {
            return Err(AnalysisError::InsufficientSpeech {
                segments,
                speech_ratio,
            });
        }

        Ok(())
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> Result<AudioAnalysis, AnalysisError> {
        self.check_content(samples, sample_rate)?;

        let s = &self.settings;
        let duration = samples.len() as f64 / sample_rate as f64;
        let stride = s.volume_stride.max(1);

        let mut total_volume = 0.0_f64;
        let mut max_volume = 0.0_f64;
        // Amplitudes are non-negative, so the floor stays at zero.
        let min_volume = 0.0_f64;
        for &x in samples.iter().step_by(stride) {
            let sample = x.abs() as f64;
            total_volume += sample;
            max_volume = max_volume.max(sample);
        }
        let average_volume = total_volume / (samples.len() as f64 / stride as f64);
        let speech_segments = count_transitions(samples, stride, s.silence_threshold);

        let analysis = AudioAnalysis {
            duration,
            sample_rate,
            average_volume,
            max_volume,
            volume_range: max_volume - min_volume,
            speech_rate: speech_rate(speech_segments, duration),
            clarity: self.clarity(samples),
            consistency: self.consistency(samples),
            energy: self.energy(samples),
            speech_segments,
        };

        tracing::debug!(
            duration = analysis.duration,
            average_volume = analysis.average_volume,
            clarity = analysis.clarity,
            consistency = analysis.consistency,
            energy = analysis.energy,
            segments = analysis.speech_segments,
            "Audio analysis complete"
        );

        Ok(analysis)
    }

    /// Weighted sum: volume 20, clarity 30, consistency 25, speech rate 15,
    /// energy 10, plus a small bonus for the number of speech segments.
    pub fn score(&self, analysis: &AudioAnalysis) -> Result<u8, AnalysisError> {
        if analysis.speech_segments < self.settings.min_segments {
            return Err(AnalysisError::InsufficientSpeech {
                segments: analysis.speech_segments,
                speech_ratio: 0.0,
            });
        }

        let volume = (analysis.average_volume / 0.05 * 20.0).clamp(0.0, 20.0);
        let clarity = analysis.clarity as f64 / 100.0 * 30.0;
        let consistency = analysis.consistency as f64 / 100.0 * 25.0;
        let rate = speech_rate_points(analysis.speech_rate) as f64;
        let energy = analysis.energy as f64 / 100.0 * 10.0;
        let bonus = match analysis.speech_segments {
            n if n >= 5 => 5.0,
            n if n >= 3 => 3.0,
            n if n >= 2 => 1.0,
            _ => 0.0,
        };

        let total = volume + clarity + consistency + rate + energy + bonus;
        Ok(total.round().clamp(0.0, 100.0) as u8)
    }

    /// Mean sample-to-sample difference of voiced samples.
    fn clarity(&self, samples: &[f32]) -> u8 {
        let stride = self.settings.clarity_stride.max(1);
        let threshold = self.settings.silence_threshold;
        let mut total_variation = 0.0_f64;
        let mut valid = 0_usize;

        let mut i = stride;
        while i < samples.len() {
            if samples[i].abs() > threshold {
                total_variation += (samples[i] - samples[i - stride]).abs() as f64;
                valid += 1;
            }
            i += stride;
        }

        if valid == 0 {
            return 0;
        }
        clarity_band(total_variation / valid as f64)
    }

    /// Rate of large amplitude jumps between voiced samples.
    fn consistency(&self, samples: &[f32]) -> u8 {
        let stride = self.settings.consistency_stride.max(1);
        let threshold = self.settings.silence_threshold;
        let jump = self.settings.consistency_jump;
        let mut changes = 0_usize;
        let mut valid = 0_usize;
        let mut last = 0.0_f32;

        let mut i = stride;
        while i < samples.len() {
            let current = samples[i].abs();
            if current > threshold {
                if (current - last).abs() > jump {
                    changes += 1;
                }
                last = current;
                valid += 1;
            }
            i += stride;
        }

        if valid == 0 {
            return 0;
        }
        consistency_band(changes as f64 / valid as f64)
    }

    /// Mean and variance of voiced amplitudes.
    fn energy(&self, samples: &[f32]) -> u8 {
        let stride = self.settings.energy_stride.max(1);
        let threshold = self.settings.silence_threshold;
        let voiced: Vec<f64> = samples
            .iter()
            .step_by(stride)
            .map(|x| x.abs())
            .filter(|&x| x > threshold)
            .map(f64::from)
            .collect();

        if voiced.is_empty() {
            return 0;
        }

        let mean = voiced.iter().sum::<f64>() / voiced.len() as f64;
        let variance = voiced.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / voiced.len() as f64;
        energy_band(mean, variance)
    }
}

/// Silence-to-sound crossings between samples `stride` apart.
fn count_transitions(samples: &[f32], stride: usize, threshold: f32) -> u32 {
    let mut count = 0;
    let mut i = 0;
    while i < samples.len() {
        if i > stride && samples[i].abs() > threshold && samples[i - stride].abs() <= threshold {
            count += 1;
        }
        i += stride;
    }
    count
}

/// Each segment stands for roughly one and a half words.
fn speech_rate(segments: u32, duration: f64) -> u32 {
    if segments < 2 || duration <= 0.0 {
        return 0;
    }
    let words = (segments as f64 * 1.5).round();
    let wpm = (words / duration * 60.0).round();
    wpm.clamp(60.0, 300.0) as u32
}

fn speech_rate_points(wpm: u32) -> u32 {
    match wpm {
        0 => 0,
        120..=180 => 15,
        100..=200 => 12,
        80..=220 => 8,
        60..=240 => 5,
        _ => 2,
    }
}

fn clarity_band(average_variation: f64) -> u8 {
    match average_variation {
        v if v < 0.02 => 95,
        v if v < 0.04 => 85,
        v if v < 0.06 => 75,
        v if v < 0.08 => 65,
        v if v < 0.1 => 55,
        _ => 45,
    }
}

fn consistency_band(change_rate: f64) -> u8 {
    match change_rate {
        r if r < 0.05 => 95,
        r if r < 0.1 => 85,
        r if r < 0.15 => 75,
        r if r < 0.2 => 65,
        r if r < 0.25 => 55,
        _ => 45,
    }
}

fn energy_band(mean: f64, variance: f64) -> u8 {
    const TABLE: [(f64, f64, u8); 5] = [
        (0.05, 0.005, 95),
        (0.04, 0.01, 85),
        (0.03, 0.015, 75),
        (0.02, 0.02, 65),
        (0.01, 0.025, 55),
    ];
    TABLE
        .iter()
        .find(|(min_mean, max_var, _)| mean > *min_mean && variance < *max_var)
        .map(|(_, _, score)| *score)
        .unwrap_or(45)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    /// 0.3s bursts of a 220Hz tone separated by 0.2s of silence.
    fn bursts(seconds: f64, amplitude: f32) -> Vec<f32> {
        let total = (seconds * RATE as f64) as usize;
        let period = (0.5 * RATE as f64) as usize;
        let on = (0.3 * RATE as f64) as usize;
        (0..total)
            .map(|i| {
                if i % period < on {
                    let t = i as f32 / RATE as f32;
                    amplitude * (2.0 * std::f32::consts::PI * 220.0 * t).sin()
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn analysis(avg: f64, clarity: u8, consistency: u8, rate: u32, energy: u8, segments: u32) -> AudioAnalysis {
        AudioAnalysis {
            duration: 10.0,
            sample_rate: RATE,
            average_volume: avg,
            max_volume: avg * 2.0,
            volume_range: avg * 2.0,
            speech_rate: rate,
            clarity,
            consistency,
            energy,
            speech_segments: segments,
        }
    }

    #[test]
    fn test_empty_recording_fails() {
        let scorer = SpeechScorer::default();
        assert_eq!(scorer.analyze(&[], RATE), Err(AnalysisError::EmptyRecording));
    }

    #[test]
    fn test_zero_sample_rate_fails() {
        let scorer = SpeechScorer::default();
        assert_eq!(
            scorer.analyze(&[0.1; 100], 0),
            Err(AnalysisError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn test_short_recording_fails() {
        let scorer = SpeechScorer::default();
        let samples = bursts(0.4, 0.2);
        assert!(matches!(
            scorer.analyze(&samples, RATE),
            Err(AnalysisError::TooShort { .. })
        ));
    }

    #[test]
    fn test_silence_never_scores() {
        let scorer = SpeechScorer::default();
        let silence = vec![0.0_f32; RATE as usize * 3];
        assert_eq!(
            scorer.analyze(&silence, RATE),
            Err(AnalysisError::SilenceDetected)
        );

        let hiss: Vec<f32> = (0..RATE as usize * 3)
            .map(|i| if i % 2 == 0 { 0.001 } else { -0.001 })
            .collect();
        assert_eq!(scorer.analyze(&hiss, RATE), Err(AnalysisError::SilenceDetected));
    }

    #[test]
    fn test_steady_signal_without_onsets_is_insufficient() {
        let scorer = SpeechScorer::default();
        let hum = vec![0.2_f32; RATE as usize * 3];
        assert!(matches!(
            scorer.analyze(&hum, RATE),
            Err(AnalysisError::InsufficientSpeech { segments: 0, .. })
        ));
    }

    #[test]
    fn test_bursts_produce_bounded_score() {
        let scorer = SpeechScorer::default();
        let samples = bursts(3.0, 0.2);
        let analysis = scorer.analyze(&samples, RATE).unwrap();

        assert!(analysis.speech_segments >= 2);
        assert!((analysis.duration - 3.0).abs() < 1e-9);
        assert!(analysis.average_volume > 0.0);
        assert!((60..=300).contains(&analysis.speech_rate));

        let score = scorer.score(&analysis).unwrap();
        assert!(score <= 100);
    }

    /// Default thresholds with every pass at stride 1.
    fn unit_stride_settings() -> ScorerSettings {
        ScorerSettings {
            gate_stride: 1,
            volume_stride: 1,
            clarity_stride: 1,
            consistency_stride: 1,
            energy_stride: 1,
            ..ScorerSettings::default()
        }
    }

    /// Four `[0, 0, 0.125, 0.1]` bursts; analyzed at 10 Hz below.
    fn square_bursts() -> Vec<f32> {
        [0.0, 0.0, 0.125, 0.1].repeat(4)
    }

    #[test]
    fn test_sub_scores_of_square_bursts() {
        let scorer = SpeechScorer::new(unit_stride_settings());
        let samples = square_bursts();
        let analysis = scorer.analyze(&samples, 10).unwrap();

        // 16 samples at 10 Hz
        assert!((analysis.duration - 1.6).abs() < 1e-9);
        // onsets at i = 2, 6, 10, 14
        assert_eq!(analysis.speech_segments, 4);
        // 4 × (0.125 + 0.1) / (16 / 1)
        assert!((analysis.average_volume - 0.05625).abs() < 1e-6);
        assert_eq!(analysis.max_volume, 0.125);
        assert_eq!(analysis.volume_range, 0.125);
        // round(4 × 1.5) = 6 words over 1.6s
        assert_eq!(analysis.speech_rate, 225);
        // voiced diffs 0.125 (onset) and 0.025 per burst: 0.6 / 8 = 0.075 < 0.08
        assert_eq!(analysis.clarity, 65);
        // only the first onset jumps from `last = 0`; 1 / 8 = 0.125 < 0.15
        assert_eq!(analysis.consistency, 75);
        // mean 0.1125, population variance 0.00015625
        assert_eq!(analysis.energy, 95);

        // 20 (capped) + 19.5 + 18.75 + 5 + 9.5 + 3 = 75.75
        assert_eq!(scorer.score(&analysis), Ok(76));
    }

    #[test]
    fn test_clarity_pass_starts_at_stride() {
        let scorer = SpeechScorer::new(ScorerSettings {
            clarity_stride: 2,
            ..unit_stride_settings()
        });
        // even indices only: 0.125 at 2, 6, 10, 14, each against a silent
        // sample two back, so the mean variation is 0.125
        assert_eq!(scorer.clarity(&square_bursts()), 45);
    }

    #[test]
    fn test_energy_band_follows_variance() {
        let scorer = SpeechScorer::new(unit_stride_settings());
        // voiced 0.02 and 0.3: mean 0.16, population variance 0.0196 (the
        // sample variance 0.0392 would fall through to 45)
        let samples = [0.0, 0.02, 0.0, 0.3];
        assert_eq!(scorer.energy(&samples), 65);
    }

    #[test]
    fn test_score_weights() {
        let scorer = SpeechScorer::default();
        // 10 + 22.5 + 16.25 + 8 + 5.5 + 3 = 65.25
        let a = analysis(0.025, 75, 65, 90, 55, 3);
        assert_eq!(scorer.score(&a), Ok(65));
    }

    #[test]
    fn test_score_is_clamped_to_100() {
        let scorer = SpeechScorer::default();
        let a = analysis(0.2, 95, 95, 150, 95, 8);
        assert_eq!(scorer.score(&a), Ok(100));
    }

    #[test]
    fn test_score_requires_two_segments() {
        let scorer = SpeechScorer::default();
        let a = analysis(0.05, 95, 95, 150, 95, 1);
        assert!(matches!(
            scorer.score(&a),
            Err(AnalysisError::InsufficientSpeech { segments: 1, .. })
        ));
    }

    #[test]
    fn test_speech_rate_estimate() {
        assert_eq!(speech_rate(1, 10.0), 0);
        // 10 segments -> 15 words over 10s = 90 wpm
        assert_eq!(speech_rate(10, 10.0), 90);
        // clamped at both ends
        assert_eq!(speech_rate(2, 60.0), 60);
        assert_eq!(speech_rate(100, 1.0), 300);
    }

    #[test]
    fn test_speech_rate_points() {
        assert_eq!(speech_rate_points(0), 0);
        assert_eq!(speech_rate_points(150), 15);
        assert_eq!(speech_rate_points(110), 12);
        assert_eq!(speech_rate_points(210), 8);
        assert_eq!(speech_rate_points(65), 5);
        assert_eq!(speech_rate_points(280), 2);
    }

    #[test]
    fn test_threshold_tables() {
        assert_eq!(clarity_band(0.01), 95);
        assert_eq!(clarity_band(0.05), 75);
        assert_eq!(clarity_band(0.5), 45);

        assert_eq!(consistency_band(0.0), 95);
        assert_eq!(consistency_band(0.12), 75);
        assert_eq!(consistency_band(0.9), 45);

        assert_eq!(energy_band(0.06, 0.001), 95);
        assert_eq!(energy_band(0.06, 0.012), 75);
        assert_eq!(energy_band(0.005, 0.0), 45);
    }

    #[test]
    fn test_transitions_skip_first_strides() {
        let mut samples = vec![0.0_f32; 1000];
        samples[100] = 0.5; // i == stride, not counted
        samples[300] = 0.5;
        assert_eq!(count_transitions(&samples, 100, 0.005), 1);
    }
}
