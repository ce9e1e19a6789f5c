//! # Core Module
//!
//! Core domain types, configuration, and error handling for the debate engine.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Add error taxonomy and word-budget utilities
//! - 1.1.0: Add session/participant/judge domain types
//! - 1.0.0: Initial creation with config module

pub mod config;
pub mod error;
pub mod text;
pub mod types;

// Re-export commonly used items
pub use config::Config;
pub use error::{DebateError, ProviderError};
pub use text::{count_words, enforce_word_limit, ELLIPSIS};
pub use types::{
    DebateResult, Judge, JudgeScore, Participant, Session, SessionStatus, Stance, StanceTotals,
    TurnMessage, Winner, MAX_SCORE, MIN_SCORE,
};
