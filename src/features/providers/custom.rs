//! Generic JSON endpoint backend for self-hosted or compatible services

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{with_context, AgentProvider, ApiConfig, ProviderKind, ProviderResponse, UsageMetadata};
use crate::core::{DebateError, ProviderError};

pub struct CustomProvider {
    config: ApiConfig,
    endpoint: String,
    client: reqwest::Client,
}

impl CustomProvider {
    /// Custom endpoints have no default URL, so a missing `base_url` is a configuration error
    pub fn new(config: ApiConfig, client: reqwest::Client) -> Result<Self, DebateError> {
        let endpoint = config
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                DebateError::Configuration(format!(
                    "Custom provider config '{}' has no base_url",
                    config.id
                ))
            })?;
        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    fn request_body(&self, prompt: &str, context: Option<&str>) -> Value {
        let mut body = json!({
            "prompt": with_context(prompt, context),
            "model": self.config.model,
        });
        if let (Some(map), Ok(Value::Object(params))) = (
            body.as_object_mut(),
            serde_json::to_value(&self.config.parameters),
        ) {
            map.extend(params);
        }
        body
    }

    fn error(message: impl Into<String>) -> ProviderError {
        ProviderError::new(ProviderKind::Custom, message)
    }
}

fn parse_response(body: &Value) -> ProviderResponse {
    let content = body["content"]
        .as_str()
        .or_else(|| body["response"].as_str())
        .unwrap_or("")
        .to_string();
    let usage = body
        .get("usage")
        .and_then(|u| serde_json::from_value::<UsageMetadata>(u.clone()).ok());
    ProviderResponse { content, usage }
}

#[async_trait]
impl AgentProvider for CustomProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(prompt, context))
            .send()
            .await
            .map_err(|e| Self::error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::error(format!("HTTP {}: {}", status, text)));
        }

        let json: Value = response.json().await.map_err(|e| Self::error(e.to_string()))?;
        Ok(parse_response(&json))
    }
}
