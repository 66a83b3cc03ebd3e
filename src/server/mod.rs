//! # Server Components
//!
//! ## Core ([`coordinator`], [`state`])
//! The poll itself: phase, voter count, tallies, and the rules for changing them.
//!
//! ## Plumbing
//! - [`dispatcher`]: single task that serializes every event onto the coordinator
//! - [`hub`]: registry of live connections and their outbound queues
//! - [`connection`]: per-socket reader/writer tasks
//! - [`access`]: turns a client-asserted role into a granted one
//! - [`server`]: axum router, static assets, listener
//! - [`config`]: TOML configuration

pub mod access;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod dispatcher;
pub mod hub;
pub mod server;
pub mod state;

/// Identity the connection layer assigns to each socket.
pub type ConnectionId = uuid::Uuid;

pub use config::ServerConfig;
pub use coordinator::{PollCoordinator, Transport};
pub use server::PollServer;
pub use state::PollState;
