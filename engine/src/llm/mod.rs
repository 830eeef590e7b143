//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface for the external language-model
//! capability (Gemini, Grok). The `LlmClient` trait defines the contract
//! all providers implement, enabling the failover router to swap providers
//! transparently. The engine treats every LLM response as untrusted input:
//! plan proposals are fully re-validated by the planner before execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod gemini;
pub mod grok;
pub mod router;

pub use router::LlmRouter;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// LLM client trait that all providers must implement
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the name of the provider (e.g., "gemini", "grok")
    fn name(&self) -> &str;

    /// Generate a text completion for a conversation.
    ///
    /// # Arguments
    /// * `messages` - Conversation history including system prompt and user messages
    ///
    /// # Returns
    /// * `Ok(String)` - Raw model output (the planner parses and validates it)
    /// * `Err(LlmError)` - If the request fails
    async fn complete(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently usable (e.g., API key present).
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Extract a JSON value from raw model output.
///
/// Handles the formats models actually produce:
/// 1. The entire content is valid JSON
/// 2. JSON inside a markdown code fence (with or without trailing prose)
/// 3. A JSON object or array embedded in prose
pub fn extract_json(content: &str) -> Option<serde_json::Value> {
    let trimmed = content.trim();

    // Pattern 1: the whole response is JSON
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // Pattern 2: fenced code block, possibly with trailing text
    if let Some(inner) = extract_fenced(trimmed) {
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    // Pattern 3: scan for the first balanced object or array in prose
    for open in ['{', '['] {
        if let Some(pos) = trimmed.find(open) {
            if let Some(candidate) = extract_balanced(&trimmed[pos..]) {
                if let Ok(value) = serde_json::from_str(candidate) {
                    return Some(value);
                }
            }
        }
    }

    None
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object or array starting at position 0 of `s`.
///
/// Counts bracket depth, respecting string literals, to find the matching
/// close bracket.
fn extract_balanced(s: &str) -> Option<&str> {
    let first = s.chars().next()?;
    if first != '{' && first != '[' {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' | '[' if !in_string => depth += 1,
            '}' | ']' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let system_msg = Message::system("You are a planner");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_extract_json_raw() {
        let content = r#"{"intent": "height", "steps": []}"#;
        let value = extract_json(content).unwrap();
        assert_eq!(value["intent"], "height");
    }

    #[test]
    fn test_extract_json_fenced() {
        let content = "Here is the plan:\n```json\n{\"steps\": [1, 2]}\n```\nHope this helps!";
        let value = extract_json(content).unwrap();
        assert_eq!(value["steps"], json!([1, 2]));
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let content = "The plan is {\"steps\": [{\"operation\": \"get_block\"}]} as requested.";
        let value = extract_json(content).unwrap();
        assert_eq!(value["steps"][0]["operation"], "get_block");
    }

    #[test]
    fn test_extract_json_array() {
        let content = "Steps: [{\"operation\": \"a\"}, {\"operation\": \"b\"}] done";
        let value = extract_json(content).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_extract_json_none_for_prose() {
        assert!(extract_json("I cannot answer that question.").is_none());
    }

    #[test]
    fn test_extract_balanced_respects_strings() {
        let content = r#"{"text": "a } inside a string"}"#;
        let value = extract_json(content).unwrap();
        assert_eq!(value["text"], "a } inside a string");
    }

    #[test]
    fn test_message_role_display() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::System.to_string(), "system");
    }
}
