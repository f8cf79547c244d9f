//! OpenAI-compatible chat completions backend.
//!
//! Works with any server exposing `POST {base_url}/chat/completions`
//! (OpenAI, OpenRouter, Ollama, llama.cpp server, ...). Each prompt is sent
//! as a single user message. No request timeout is applied.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use super::{LanguageModel, LlmError};

/// HTTP language model client
pub struct OpenAiModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiModel {
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    /// Send a bearer token with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Pull the first choice's message text out of a completions response
fn parse_content(data: &Value) -> Result<String, LlmError> {
    let content = data["choices"]
        .get(0)
        .and_then(|choice| choice["message"]["content"].as_str())
        .map(str::trim)
        .unwrap_or_default();

    if content.is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(content.to_string())
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn respond(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let url = self.endpoint();
        debug!(model = %self.model, url = %url, prompt_len = prompt.len(), "Calling language model");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, "Language model API error");
            return Err(LlmError::Request(format!("HTTP {}: {}", status.as_u16(), text.trim())));
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::Request(format!("invalid JSON response: {}", e)))?;
        parse_content(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let model = OpenAiModel::new("http://localhost:11434/v1/", "llama3");
        assert_eq!(model.endpoint(), "http://localhost:11434/v1/chat/completions");
        assert_eq!(model.name(), "llama3");
    }

    #[test]
    fn test_parse_content() {
        let data = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  hi there \n" } }]
        });
        assert_eq!(parse_content(&data).unwrap(), "hi there");

        let empty = json!({ "choices": [] });
        assert!(matches!(parse_content(&empty), Err(LlmError::Empty)));
    }
}
