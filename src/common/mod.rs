//! # Common Components
//!
//! Shared utilities and data structures used by both the server and the client.
//!
//! ## Modules
//!
//! - [`messages`]: Event definitions for client-server communication
//! - [`config`]: Configuration parsing utilities
//! - [`logging`]: Logger setup shared by the binaries

pub mod config;
pub mod logging;
pub mod messages;
