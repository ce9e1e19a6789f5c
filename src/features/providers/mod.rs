//! # Agent Response Providers
//!
//! One capability shared by every AI backend: turn a prompt into text plus
//! usage metadata. Backends are picked once, when an engine loads its
//! credentials, through a [`ProviderFactory`].
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Factory seam so engines can be driven by scripted providers
//! - 1.0.0: OpenAI, Anthropic and custom HTTP backends

pub mod anthropic;
pub mod custom;
pub mod openai;

#[cfg(test)]
pub(crate) mod scripted;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{DebateError, ProviderError};

pub use anthropic::AnthropicProvider;
pub use custom::CustomProvider;
pub use openai::OpenAiProvider;

/// Temperature used when a config does not set one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Completion token cap used when a config does not set one
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Which backend a credential talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "custom")]
    Custom,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Custom => "custom",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DebateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "custom" => Ok(ProviderKind::Custom),
            other => Err(DebateError::Configuration(format!(
                "Unsupported AI provider: {}",
                other
            ))),
        }
    }
}

/// Sampling parameters forwarded to the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl ProviderParameters {
    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// A stored credential/model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub id: String,
    pub name: String,
    pub provider: ProviderKind,
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default)]
    pub parameters: ProviderParameters,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Token accounting reported by a backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Text generated for one prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub content: String,
    pub usage: Option<UsageMetadata>,
}

/// The capability every backend implements.
///
/// Implementations never retry; the caller decides what a failure means.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError>;
}

/// Builds providers from stored configurations
pub trait ProviderFactory: Send + Sync {
    fn create(&self, config: &ApiConfig) -> Result<Arc<dyn AgentProvider>, DebateError>;
}

/// Factory for the real HTTP backends
#[derive(Clone)]
pub struct DefaultProviderFactory {
    client: reqwest::Client,
    timeout: Duration,
}

impl DefaultProviderFactory {
    pub fn new(timeout: Duration) -> Result<Self, DebateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DebateError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, config: &ApiConfig) -> Result<Arc<dyn AgentProvider>, DebateError> {
        let provider: Arc<dyn AgentProvider> = match config.provider {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(config.clone(), self.timeout)),
            ProviderKind::Anthropic => {
                Arc::new(AnthropicProvider::new(config.clone(), self.client.clone()))
            }
            ProviderKind::Custom => {
                Arc::new(CustomProvider::new(config.clone(), self.client.clone())?)
            }
        };
        Ok(provider)
    }
}

/// Join an optional context block onto a prompt the way single-message backends expect
pub(crate) fn with_context(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(context) => format!("{}\n\n{}", context, prompt),
        None => prompt.to_string(),
    }
}

/// Build a config for tests and fixtures
#[cfg(test)]
pub(crate) fn test_config(id: &str, provider: ProviderKind) -> ApiConfig {
    ApiConfig {
        id: id.to_string(),
        name: format!("{} config", id),
        provider,
        api_key: "sk-test".to_string(),
        base_url: None,
        model: "test-model".to_string(),
        parameters: ProviderParameters::default(),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("custom".parse::<ProviderKind>().unwrap(), ProviderKind::Custom);
        assert!(matches!(
            "google".parse::<ProviderKind>(),
            Err(DebateError::Configuration(_))
        ));
    }

    #[test]
    fn test_parameter_defaults() {
        let params = ProviderParameters::default();
        assert_eq!(params.temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(params.max_tokens(), DEFAULT_MAX_TOKENS);

        let params: ProviderParameters =
            serde_json::from_str(r#"{"temperature": 0.2, "max_tokens": 50}"#).unwrap();
        assert_eq!(params.temperature(), 0.2);
        assert_eq!(params.max_tokens(), 50);
    }

    #[test]
    fn test_with_context() {
        assert_eq!(with_context("argue", None), "argue");
        assert_eq!(with_context("argue", Some("history")), "history\n\nargue");
    }

    #[test]
    fn test_factory_selects_backend() {
        let factory = DefaultProviderFactory::new(Duration::from_secs(5)).unwrap();

        let openai = factory.create(&test_config("a", ProviderKind::OpenAi)).unwrap();
        assert_eq!(openai.kind(), ProviderKind::OpenAi);

        let anthropic = factory.create(&test_config("b", ProviderKind::Anthropic)).unwrap();
        assert_eq!(anthropic.kind(), ProviderKind::Anthropic);

        // Custom endpoints have no default URL
        let custom = factory.create(&test_config("c", ProviderKind::Custom));
        assert!(matches!(custom, Err(DebateError::Configuration(_))));

        let mut config = test_config("d", ProviderKind::Custom);
        config.base_url = Some("http://localhost:9000/generate".to_string());
        assert_eq!(factory.create(&config).unwrap().kind(), ProviderKind::Custom);
    }
}
