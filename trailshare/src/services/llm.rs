// Minimal client for the Anthropic Messages API.
//
// Non-streaming: relevance scoring needs the whole reply before it can parse
// the JSON array out of it.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API returned status {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("LLM reply contained no text")]
    EmptyReply,
}

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one user message and return the concatenated text blocks of the reply.
    ///
    /// # Errors
    /// Transport failures, non-success statuses and replies without text.
    pub async fn complete(
        &self,
        system: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": user_content }]
        });

        let response = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status,
                message: extract_error_message(&payload),
            });
        }

        let text = extract_text(&payload).ok_or(LlmError::EmptyReply)?;
        debug!(model = %self.model, chars = text.len(), "LLM reply received");
        Ok(text)
    }
}

/// Concatenate `content[*].text` of a Messages API response.
///
/// Expected shape: `{ "content": [ { "type": "text", "text": "..." } ] }`
fn extract_text(payload: &Value) -> Option<String> {
    let text: String = payload
        .get("content")?
        .as_array()?
        .iter()
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

/// Expected shape: `{ "type": "error", "error": { "message": "..." } }`
fn extract_error_message(payload: &Value) -> String {
    payload
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_blocks() {
        let payload = serde_json::json!({
            "content": [
                {"type": "text", "text": "[{\"id\":"},
                {"type": "text", "text": "\"a\",\"score\":10}]"}
            ]
        });
        assert_eq!(
            extract_text(&payload).unwrap(),
            "[{\"id\":\"a\",\"score\":10}]"
        );
    }

    #[test]
    fn test_extract_text_empty() {
        assert!(extract_text(&serde_json::json!({"content": []})).is_none());
        assert!(extract_text(&serde_json::json!({})).is_none());
    }

    #[test]
    fn test_extract_error_message() {
        let payload = serde_json::json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        });
        assert_eq!(extract_error_message(&payload), "Overloaded");
        assert_eq!(extract_error_message(&serde_json::json!({})), "unknown error");
    }
}
