//! # Client Components
//!
//! [`PollClient`] connects to the poll server over WebSocket, sends votes or
//! admin commands, and decodes the events the server pushes back.

pub mod client;

pub use client::{endpoint_url, PollClient};
