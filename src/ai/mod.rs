pub mod chat;
pub mod intent;
pub mod tips;

use crate::fallback::Decline;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("API key is not configured")]
    MissingApiKey,
}

impl From<AiError> for Decline {
    fn from(err: AiError) -> Self {
        match err {
            AiError::MissingApiKey => Decline::NotConfigured,
            other => Decline::Failed(other.to_string()),
        }
    }
}

/// Connection details for one OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, AiError> {
        let client = Client::builder()
            .user_agent("AgriConnect/1.0")
            .timeout(settings.timeout)
            .build()?;

        Ok(Self { client, settings })
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    pub async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, AiError> {
        let api_key = self.settings.api_key.as_deref().ok_or(AiError::MissingApiKey)?;

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: 500,
            temperature: 0.7,
            stream: false,
        };

        let response = self
            .client
            .post(&self.settings.base_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "AgriConnect")
            .json(&request)
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::OK => {
                let body = response.text().await?;
                let chat_response: ChatResponse = serde_json::from_str(&body)?;
                chat_response
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message.content)
                    .ok_or_else(|| AiError::ApiError("No response choices".to_string()))
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => Err(AiError::RateLimited),
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(AiError::ApiError(format!("HTTP {}: {}", status, error_text)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_key: Option<&str>) -> LlmSettings {
        LlmSettings {
            name: "openai".to_string(),
            base_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            api_key: api_key.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "Plant after the first good rains."}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 8, "total_tokens": 18}
        }"#;

        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Plant after the first good rains.");
    }

    #[tokio::test]
    async fn test_missing_key_declines_as_not_configured() {
        let client = LlmClient::new(settings(None)).unwrap();
        assert!(!client.is_configured());

        let err = client.complete(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AiError::MissingApiKey));
        assert!(matches!(Decline::from(err), Decline::NotConfigured));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_declines_as_failed() {
        let client = LlmClient::new(settings(Some("sk-test"))).unwrap();
        assert_eq!(client.name(), "openai");

        let err = client.complete(vec![ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, AiError::RequestFailed(_)));
        assert!(matches!(Decline::from(err), Decline::Failed(_)));
    }
}
