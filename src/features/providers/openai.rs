//! OpenAI chat-completions backend

use async_trait::async_trait;
use log::debug;
use std::time::Duration;
use tokio::time::timeout;
use openai::chat::{ChatCompletion, ChatCompletionMessage, ChatCompletionMessageRole};
use openai::Credentials;

use super::{AgentProvider, ApiConfig, ProviderKind, ProviderResponse, UsageMetadata};
use crate::core::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

const SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

pub struct OpenAiProvider {
    config: ApiConfig,
    /// Upper bound on one completion call
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: ApiConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn credentials(&self) -> Credentials {
        let mut base_url = self
            .config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Credentials::new(self.config.api_key.clone(), base_url)
    }
}

fn message(role: ChatCompletionMessageRole, content: String) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Some(content),
        name: None,
        function_call: None,
        tool_call_id: None,
        tool_calls: None,
    }
}

#[async_trait]
impl AgentProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut messages = vec![message(
            ChatCompletionMessageRole::System,
            SYSTEM_PROMPT.to_string(),
        )];
        if let Some(context) = context {
            messages.push(message(
                ChatCompletionMessageRole::User,
                format!("Context: {}", context),
            ));
        }
        messages.push(message(ChatCompletionMessageRole::User, prompt.to_string()));

        let params = &self.config.parameters;
        let mut builder = ChatCompletion::builder(&self.config.model, messages)
            .credentials(self.credentials())
            .temperature(params.temperature())
            .max_tokens(u64::from(params.max_tokens()))
            .top_p(params.top_p.unwrap_or(1.0))
            .frequency_penalty(params.frequency_penalty.unwrap_or(0.0));
        if let Some(presence_penalty) = params.presence_penalty {
            builder = builder.presence_penalty(presence_penalty);
        }

        let completion = timeout(self.timeout, builder.create())
            .await
            .map_err(|_| {
                ProviderError::new(
                    ProviderKind::OpenAi,
                    format!("request timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| ProviderError::new(ProviderKind::OpenAi, e.to_string()))?;

        let usage = completion.usage.as_ref().map(|u| UsageMetadata {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        if let Some(usage) = &usage {
            debug!(
                "OpenAI {} used {} tokens ({} prompt, {} completion)",
                self.config.model, usage.total_tokens, usage.prompt_tokens, usage.completion_tokens
            );
        }

        let content = completion
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(ProviderResponse { content, usage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::providers::test_config;

    #[tokio::test]
    async fn test_stalled_endpoint_times_out() {
        // Accepts connections into the backlog but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut config = test_config("gpt", ProviderKind::OpenAi);
        config.base_url = Some(format!("http://{}/v1", listener.local_addr().unwrap()));
        let provider = OpenAiProvider::new(config, Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = provider.generate("Hello", None).await.unwrap_err();
        assert_eq!(err.provider, ProviderKind::OpenAi);
        assert!(err.message.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }
}
