use thiserror::Error;

use crate::core::recorder::RecorderError;
use crate::core::scorer::AnalysisError;

#[derive(Error, Debug)]
pub enum PracticeError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Service returned HTTP {status} for {endpoint}: {message}")]
    HttpStatus {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Audio decoding error: {0}")]
    AudioError(#[from] hound::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Speech analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Recording error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Not logged in: {message}")]
    SessionError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration field '{field}' is invalid: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    Audio,
    Session,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PracticeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PracticeError::ApiError(_) | PracticeError::HttpStatus { .. } => ErrorCategory::Network,
            PracticeError::IoError(_) | PracticeError::CsvError(_) => ErrorCategory::Storage,
            PracticeError::ConfigError { .. }
            | PracticeError::ConfigValidationError { .. }
            | PracticeError::MissingConfigError { .. }
            | PracticeError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            PracticeError::AudioError(_)
            | PracticeError::Analysis(_)
            | PracticeError::Recorder(_) => ErrorCategory::Audio,
            PracticeError::SessionError { .. } => ErrorCategory::Session,
            PracticeError::SerializationError(_) | PracticeError::ValidationError { .. } => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // A silent clip is an expected user outcome, not a fault.
            PracticeError::Analysis(_) => ErrorSeverity::Low,
            PracticeError::ApiError(_) | PracticeError::HttpStatus { .. } => ErrorSeverity::Medium,
            PracticeError::SessionError { .. }
            | PracticeError::Recorder(_)
            | PracticeError::AudioError(_)
            | PracticeError::SerializationError(_)
            | PracticeError::ValidationError { .. }
            | PracticeError::CsvError(_) => ErrorSeverity::High,
            PracticeError::IoError(_)
            | PracticeError::ConfigError { .. }
            | PracticeError::ConfigValidationError { .. }
            | PracticeError::MissingConfigError { .. }
            | PracticeError::InvalidConfigValueError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PracticeError::ApiError(_) | PracticeError::HttpStatus { .. } => {
                "Check that the practice service is running and the base URL is correct"
            }
            PracticeError::Analysis(_) => {
                "Speak clearly and close to the microphone, then record again"
            }
            PracticeError::Recorder(RecorderError::PermissionDenied(_)) => {
                "Allow microphone access and try again"
            }
            PracticeError::Recorder(_) | PracticeError::AudioError(_) => {
                "Make sure the recording is a readable WAV file"
            }
            PracticeError::SessionError { .. } => "Run `speech-practice login` first",
            PracticeError::IoError(_) | PracticeError::CsvError(_) => {
                "Check that the data directory exists and is writable"
            }
            PracticeError::SerializationError(_) | PracticeError::ValidationError { .. } => {
                "The stored or received data is malformed; try logging in again"
            }
            PracticeError::ConfigError { .. }
            | PracticeError::ConfigValidationError { .. }
            | PracticeError::MissingConfigError { .. }
            | PracticeError::InvalidConfigValueError { .. } => {
                "Review the configuration file and command-line flags"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            PracticeError::ApiError(_) => "Could not reach the practice service".to_string(),
            PracticeError::HttpStatus {
                status, message, ..
            } => format!("The practice service rejected the request ({}): {}", status, message),
            PracticeError::Analysis(e) => format!("Unable to analyze your recording: {}", e),
            PracticeError::SessionError { message } => format!("Not logged in: {}", message),
            other => other.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        PracticeError::ConfigError {
            message: message.into(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        PracticeError::SessionError {
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for PracticeError {
    fn from(e: toml::de::Error) -> Self {
        PracticeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, PracticeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_errors_are_low_severity() {
        let err = PracticeError::from(AnalysisError::SilenceDetected);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.category(), ErrorCategory::Audio);
        assert!(err.user_friendly_message().contains("Unable to analyze"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = PracticeError::MissingConfigError {
            field: "service.base_url".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_permission_denied_suggestion() {
        let err = PracticeError::from(RecorderError::PermissionDenied("blocked".to_string()));
        assert_eq!(err.recovery_suggestion(), "Allow microphone access and try again");
    }
}
