//! # Features Layer
//!
//! Debate orchestration, judging, providers, reporting and roster seeding.

pub mod debate;
pub mod export;
pub mod judging;
pub mod providers;
pub mod roster;

pub use debate::{DebateController, DebateEngine, EngineEvent, NewSession};
pub use export::render_markdown;
pub use judging::{compute_result, JudgingCoordinator};
pub use providers::{AgentProvider, ApiConfig, DefaultProviderFactory, ProviderFactory, ProviderKind};
pub use roster::RosterConfig;
