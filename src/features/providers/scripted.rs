//! Scripted providers for driving engines in tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{AgentProvider, ApiConfig, ProviderFactory, ProviderKind, ProviderResponse};
use crate::core::{DebateError, ProviderError};

type Script = dyn Fn(&str) -> Result<String, String> + Send + Sync;

pub(crate) struct ScriptedProvider {
    script: Box<Script>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedProvider {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(&str) -> Result<String, String> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
    }

    async fn generate(
        &self,
        prompt: &str,
        _context: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(prompt)
            .map(|content| ProviderResponse {
                content,
                usage: None,
            })
            .map_err(|message| ProviderError::new(ProviderKind::Custom, message))
    }
}

/// Hands out scripted providers by api config id
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    providers: HashMap<String, Arc<ScriptedProvider>>,
}

impl ScriptedFactory {
    pub(crate) fn with(mut self, config_id: &str, provider: Arc<ScriptedProvider>) -> Self {
        self.providers.insert(config_id.to_string(), provider);
        self
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, config: &ApiConfig) -> Result<Arc<dyn AgentProvider>, DebateError> {
        self.providers
            .get(&config.id)
            .map(|p| p.clone() as Arc<dyn AgentProvider>)
            .ok_or_else(|| DebateError::Configuration(format!("no script for {}", config.id)))
    }
}
