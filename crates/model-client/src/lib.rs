use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use analysis_core::{AnalysisError, ModelClient};

pub mod error;
pub use error::{ModelError, ModelResult};

/// Configuration for the chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("MODEL_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key: std::env::var("MODEL_API_KEY").unwrap_or_default(),
            model: std::env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout: Duration::from_secs(45),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP client for an OpenAI-compatible chat endpoint, constrained to JSON
/// object output. One instance is shared by both pipeline stages.
#[derive(Clone)]
pub struct ChatModelClient {
    client: reqwest::Client,
    config: ModelConfig,
}

impl ChatModelClient {
    pub fn new(config: ModelConfig) -> ModelResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ModelError::RequestFailed)?;
        Ok(Self { client, config })
    }

    /// Run one chat completion and parse the reply as a JSON object.
    pub async fn chat_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> ModelResult<serde_json::Value> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ModelError::ServiceUnavailable(format!(
                "Status: {}",
                response.status()
            )));
        }

        let parsed = response.json::<ChatResponse>().await?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| ModelError::InvalidResponse("empty choices".to_string()))?;

        let value: serde_json::Value = serde_json::from_str(strip_code_fence(content))?;
        if !value.is_object() {
            return Err(ModelError::InvalidResponse(
                "model reply is not a JSON object".to_string(),
            ));
        }
        Ok(value)
    }
}

/// Some models wrap JSON-mode replies in a markdown fence anyway.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl ModelClient for ChatModelClient {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, AnalysisError> {
        self.chat_json(system_prompt, user_prompt)
            .await
            .map_err(|e| match e {
                ModelError::InvalidResponse(msg) => AnalysisError::MalformedOutput(msg),
                ModelError::Serialization(inner) => {
                    AnalysisError::MalformedOutput(inner.to_string())
                }
                other => AnalysisError::ModelUnavailable(other.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence(r#"{"a":1}"#), r#"{"a":1}"#);
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_chat_request_wire_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "system",
                content: "s",
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.2,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
    }
}
