//! # IPC Module
//!
//! Observer connections over a Unix socket: live session updates out,
//! subscriptions and control commands in.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.4.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 2.0.0: Per-session subscriptions through the broadcaster
//! - 1.0.0: Initial IPC implementation with Unix socket protocol

pub mod broadcaster;
pub mod client;
pub mod protocol;
pub mod server;

pub use broadcaster::{Broadcaster, ChannelConnection, ConnectionId, ObserverConnection};
pub use client::{connect_with_retry, ObserverClient};
pub use protocol::{ObserverCommand, ObserverEvent};
pub use server::ObserverServer;
