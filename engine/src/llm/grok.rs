use super::{LlmClient, LlmError, Message};
use crate::config::GrokConfig;
use async_trait::async_trait;
use serde_json::json;

/// Environment variable holding the xAI API key
pub const GROK_API_KEY_VAR: &str = "GROK_API_KEY";

/// Client for the xAI Grok API (OpenAI-compatible chat completions).
pub struct GrokClient {
    config: GrokConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GrokClient {
    pub fn new(config: GrokConfig) -> Self {
        Self {
            config,
            api_key: std::env::var(GROK_API_KEY_VAR).ok().filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for GrokClient {
    fn name(&self) -> &str {
        "grok"
    }

    async fn check_health(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: &[Message]) -> super::Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::AuthenticationFailed(format!("{} is not set", GROK_API_KEY_VAR)))?;

        let url = format!("{}/chat/completions", self.config.base_url);

        let api_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let payload = json!({
            "model": self.config.model,
            "messages": api_messages,
            "temperature": 0.1,
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed(text),
                429 => LlmError::RateLimitExceeded,
                _ => LlmError::InvalidRequest(text),
            });
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::ParseError("No choices in response".to_string()))?;

        if content.trim().is_empty() {
            return Err(LlmError::ParseError("Empty content".to_string()));
        }

        Ok(content.trim().to_string())
    }
}
