//! Chat-completions client for conversation practice.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapters::http::ensure_success;
use crate::config::toml_config::ChatConfig;
use crate::utils::error::{PracticeError, Result};

const ENDPOINT: &str = "chat completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    pub usage: Option<Usage>,
}

pub struct ChatClient {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatClient {
    /// Fails with `MissingConfigError` when no API key is stored.
    pub fn new(config: &ChatConfig, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| PracticeError::MissingConfigError {
                field: "chat API key (run `speech-practice set-api-key <key>`)".to_string(),
            })?;
        let parsed = Url::parse(&config.base_url).map_err(|e| {
            PracticeError::InvalidConfigValueError {
                field: "chat.base_url".to_string(),
                value: config.base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", parsed.as_str().trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send the whole prompt and return the first choice, trimmed.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };
        tracing::debug!("Sending {} message(s) to {}", messages.len(), self.model);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(ENDPOINT, response).await?;
        let completion: CompletionResponse = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PracticeError::ValidationError {
                message: "chat completion carried no reply".to_string(),
            })?;

        if let Some(usage) = completion.usage {
            tracing::debug!("Chat usage: {} tokens", usage.total_tokens);
        }
        Ok(ChatReply {
            content,
            usage: completion.usage,
        })
    }
}

/// Short reason for a failed completion, keyed on the status the service sent.
pub fn describe_failure(error: &PracticeError) -> String {
    match error {
        PracticeError::HttpStatus { status: 401, .. } => "Invalid API key".to_string(),
        PracticeError::HttpStatus { status: 429, .. } => "Rate limit exceeded".to_string(),
        PracticeError::HttpStatus { message, .. } => format!("API Error: {}", message),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let err = ChatClient::new(&ChatConfig::default(), Some("  ".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, PracticeError::MissingConfigError { .. }));
        assert!(ChatClient::new(&ChatConfig::default(), None).is_err());
    }

    #[test]
    fn test_completions_url_joins_base() {
        let config = ChatConfig {
            base_url: "http://127.0.0.1:9000/v1/".to_string(),
            ..ChatConfig::default()
        };
        let client = ChatClient::new(&config, Some("sk-test".to_string())).unwrap();
        assert_eq!(client.url, "http://127.0.0.1:9000/v1/chat/completions");
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::new(ChatRole::Assistant, "hi")).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_describe_failure() {
        let status = |status| PracticeError::HttpStatus {
            endpoint: ENDPOINT.to_string(),
            status,
            message: "context too long".to_string(),
        };
        assert_eq!(describe_failure(&status(401)), "Invalid API key");
        assert_eq!(describe_failure(&status(429)), "Rate limit exceeded");
        assert_eq!(describe_failure(&status(400)), "API Error: context too long");
    }
}
