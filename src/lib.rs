// Core layer - shared types, configuration and errors
pub mod core;

// Persistence
pub mod database;

// Features layer - debate engine, judging, providers, export, roster
pub mod features;

// IPC layer - observer socket protocol, server and client
pub mod ipc;

pub use core::{Config, DebateError};
pub use database::{Database, DebateStore};
pub use features::{DebateController, NewSession, RosterConfig};
pub use ipc::{Broadcaster, ObserverClient, ObserverEvent, ObserverServer};
