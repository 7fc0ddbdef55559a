use crate::core::pagination::DEFAULT_PAGE_SIZE;
use crate::core::scorer::ScorerSettings;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{PracticeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_DATA_DIR: &str = "./speech_data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub scoring: ScorerSettings,
    pub catalog: CatalogConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Root of every REST endpoint, e.g. `http://localhost:8080/api`.
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub page_size: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Conversation practice backend. The API key is never read from here; it
/// lives in the data dir (see `set-api-key`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: 150,
            temperature: 0.7,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PracticeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// 替換環境變數 (例如 ${PRACTICE_API_URL})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| PracticeError::config(format!("env pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Command-line values win over the file.
    pub fn apply_overrides(&mut self, base_url: Option<String>, data_dir: Option<String>) {
        if let Some(url) = base_url {
            self.service.base_url = url;
        }
        if let Some(dir) = data_dir {
            self.storage.data_dir = dir;
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("service.base_url", &self.service.base_url)?;
        validation::validate_range("service.timeout_seconds", self.service.timeout_seconds, 1, 300)?;
        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_range("catalog.page_size", self.catalog.page_size, 1, 100)?;
        validation::validate_url("chat.base_url", &self.chat.base_url)?;
        validation::validate_non_empty_string("chat.model", &self.chat.model)?;
        validation::validate_range("chat.max_tokens", self.chat.max_tokens, 1, 4096)?;
        validation::validate_range("chat.temperature", self.chat.temperature, 0.0, 2.0)?;
        validation::validate_range("chat.timeout_seconds", self.chat.timeout_seconds, 1, 300)?;

        let scoring = &self.scoring;
        for (field, stride) in [
            ("scoring.gate_stride", scoring.gate_stride),
            ("scoring.volume_stride", scoring.volume_stride),
            ("scoring.clarity_stride", scoring.clarity_stride),
            ("scoring.consistency_stride", scoring.consistency_stride),
            ("scoring.energy_stride", scoring.energy_stride),
        ] {
            validation::validate_positive_number(field, stride, 1)?;
        }
        for (field, threshold) in [
            ("scoring.gate_threshold", scoring.gate_threshold),
            ("scoring.silence_threshold", scoring.silence_threshold),
            ("scoring.consistency_jump", scoring.consistency_jump),
        ] {
            validation::validate_range(field, threshold, 0.0, 1.0)?;
        }
        validation::validate_range("scoring.min_speech_ratio", scoring.min_speech_ratio, 0.0, 1.0)?;
        validation::validate_range("scoring.min_duration_secs", scoring.min_duration_secs, 0.0, 60.0)?;

        Ok(())
    }
}

impl ConfigProvider for AppConfig {
    fn base_url(&self) -> &str {
        &self.service.base_url
    }

    fn data_dir(&self) -> &str {
        &self.storage.data_dir
    }

    fn request_timeout_secs(&self) -> u64 {
        self.service.timeout_seconds
    }

    fn page_size(&self) -> usize {
        self.catalog.page_size
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert_eq!(config.page_size(), 12);
        assert_eq!(config.scoring, ScorerSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_all_sections() {
        let toml_content = r#"
[service]
base_url = "https://practice.example.com/api"
timeout_seconds = 10

[storage]
data_dir = "/tmp/practice"

[scoring]
gate_threshold = 0.004
min_segments = 3

[catalog]
page_size = 24
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.base_url(), "https://practice.example.com/api");
        assert_eq!(config.request_timeout_secs(), 10);
        assert_eq!(config.data_dir(), "/tmp/practice");
        assert_eq!(config.scoring.gate_threshold, 0.004);
        assert_eq!(config.scoring.min_segments, 3);
        assert_eq!(config.scoring.gate_stride, 500);
        assert_eq!(config.page_size(), 24);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SPEECH_PRACTICE_TEST_URL", "https://env.example.com/api");

        let toml_content = r#"
[service]
base_url = "${SPEECH_PRACTICE_TEST_URL}"
"#;

        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "https://env.example.com/api");

        std::env::remove_var("SPEECH_PRACTICE_TEST_URL");
    }

    #[test]
    fn test_unset_env_var_fails_validation() {
        let toml_content = r#"
[service]
base_url = "${SPEECH_PRACTICE_DEFINITELY_UNSET}"
"#;
        let config = AppConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.service.base_url, "${SPEECH_PRACTICE_DEFINITELY_UNSET}");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.catalog.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scoring.gate_stride = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scoring.silence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chat_section() {
        let config = AppConfig::from_toml_str(
            "[chat]\nbase_url = \"http://127.0.0.1:8000/v1\"\nmodel = \"local-llm\"\n",
        )
        .unwrap();
        assert_eq!(config.chat.model, "local-llm");
        assert_eq!(config.chat.max_tokens, 150);
        assert!(config.validate().is_ok());

        let mut config = AppConfig::default();
        assert_eq!(config.chat.base_url, DEFAULT_CHAT_BASE_URL);
        config.chat.temperature = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = AppConfig::from_toml_str("[service\nbase_url = 1").unwrap_err();
        assert!(matches!(err, PracticeError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = AppConfig::default();
        config.apply_overrides(Some("http://127.0.0.1:9000".to_string()), None);
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.data_dir(), DEFAULT_DATA_DIR);
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[storage]\ndata_dir = \"./from-file\"\n")
            .unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.data_dir(), "./from-file");
    }
}
