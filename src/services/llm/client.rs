//! HTTP client for OpenAI-compatible chat completion APIs
//!
//! Works against OpenAI, Azure OpenAI, DeepSeek and other compatible
//! backends; the base URL is injectable through configuration.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::LlmError;
use crate::config::LlmConfig;

/// One completed chat round-trip
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    /// Message content of the first choice
    pub content: String,
    /// Prompt + completion tokens, when the backend reports usage
    pub total_tokens: Option<i64>,
}

/// Thin chat-completion client over a pooled reqwest connection
pub struct LlmClient {
    http_client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .expect("Failed to create HTTP client");

        Self { http_client, config }
    }

    /// Call the chat completion API once with a JSON-object response format.
    /// A single round-trip is bounded by `timeout_seconds`.
    pub async fn chat_completion(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<ChatCompletion, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            response_format: Some(ResponseFormat { r#type: "json_object".to_string() }),
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        tracing::debug!("Calling LLM API: {} with model {}", url, self.config.model);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_seconds)
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Api { status: status.as_u16(), message });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| LlmError::Parse("Empty response from LLM".to_string()))?;

        let total_tokens = completion
            .usage
            .map(|u| (u.prompt_tokens + u.completion_tokens) as i64);

        Ok(ChatCompletion { content, total_tokens })
    }
}

// ============================================================================
// OpenAI API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: i32,
    completion_tokens: i32,
}
