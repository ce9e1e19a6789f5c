//! Anthropic messages-API backend

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use super::{with_context, AgentProvider, ApiConfig, ProviderKind, ProviderResponse, UsageMetadata};
use crate::core::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    config: ApiConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ApiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{}/v1/messages", base)
    }

    fn error(message: impl Into<String>) -> ProviderError {
        ProviderError::new(ProviderKind::Anthropic, message)
    }
}

/// Pull text and usage out of a messages-API response body
fn parse_response(body: &Value) -> ProviderResponse {
    let content = body["content"][0]["text"].as_str().unwrap_or("").to_string();

    let usage = body.get("usage").map(|usage| {
        let input = usage["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output = usage["output_tokens"].as_u64().unwrap_or(0) as u32;
        UsageMetadata {
            prompt_tokens: input,
            completion_tokens: output,
            total_tokens: input + output,
        }
    });

    ProviderResponse { content, usage }
}

/// Best-effort extraction of the upstream error message
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AgentProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let params = &self.config.parameters;
        let body = json!({
            "model": self.config.model,
            "max_tokens": params.max_tokens(),
            "temperature": params.temperature(),
            "messages": [{
                "role": "user",
                "content": with_context(prompt, context),
            }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::error(format!("{} ({})", error_message(&text), status)));
        }

        let json: Value = response.json().await.map_err(|e| Self::error(e.to_string()))?;
        let parsed = parse_response(&json);
        debug!(
            "Anthropic {} returned {} chars",
            self.config.model,
            parsed.content.len()
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::providers::test_config;

    #[test]
    fn test_parse_response_with_usage() {
        let body = json!({
            "content": [{"type": "text", "text": "Opening argument"}],
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });
        let parsed = parse_response(&body);
        assert_eq!(parsed.content, "Opening argument");
        assert_eq!(parsed.usage.unwrap().total_tokens, 42);
    }

    #[test]
    fn test_parse_response_empty_content() {
        let parsed = parse_response(&json!({"content": []}));
        assert_eq!(parsed.content, "");
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(error_message(body), "Overloaded");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let mut config = test_config("a", ProviderKind::Anthropic);
        config.base_url = Some("https://proxy.internal/".to_string());
        let provider = AnthropicProvider::new(config, reqwest::Client::new());
        assert_eq!(provider.endpoint(), "https://proxy.internal/v1/messages");
    }
}
