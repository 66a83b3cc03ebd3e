pub mod client;
pub mod common;
pub mod server;

pub use common::messages::{ClientMessage, Phase, ServerMessage, Stats, Verdict};
pub use server::PollServer;
