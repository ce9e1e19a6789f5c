//! # Debate Feature
//!
//! Runs multi-round debates between AI participants and hands the finished
//! transcript to the judging panel.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Per-session engines with resume, driven through a shared controller
//! - 1.1.0: Context builder includes every earlier round
//! - 1.0.0: Initial round-robin turn scheduling

pub mod context;
pub mod controller;
pub mod engine;
pub mod prompt;
pub mod scheduler;

pub use context::{build_context, render_context};
pub use controller::{DebateController, NewSession};
pub use engine::{DebateEngine, EngineEvent, Slot};
pub use prompt::render_turn_prompt;
