//! Error taxonomy for the debate engine
//!
//! Turn-level and scoring-level failures (`Provider`, `Configuration`) are
//! recovered locally by skipping a single slot. `EngineState` and
//! `SessionNotFound` reject a caller's operation without side effects.
//! `Internal` is the only class that terminates a run.

use crate::core::types::SessionStatus;
use crate::features::providers::ProviderKind;
use thiserror::Error;

/// An upstream AI call failed or returned unusable content
#[derive(Debug, Clone, Error)]
#[error("{provider} provider error: {message}")]
pub struct ProviderError {
    pub provider: ProviderKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DebateError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot {operation} session {session_id} while it is {status}")]
    EngineState {
        session_id: String,
        status: SessionStatus,
        operation: &'static str,
    },

    #[error("debate session not found: {0}")]
    SessionNotFound(String),

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl DebateError {
    /// Failures the scheduler and judging coordinator skip instead of aborting on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DebateError::Provider(_) | DebateError::Configuration(_))
    }
}
