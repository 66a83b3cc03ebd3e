//! # Message Protocol
//!
//! Defines the events exchanged between the poll server and its clients
//! (voters, the admin console and the display screen).
//!
//! Every WebSocket text frame carries one JSON envelope:
//! ```text
//! {"event": "<name>", "data": <payload>}
//! ```
//! Events without a payload (`admin:start`, `reset`, ...) omit `data`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SHARED TYPES
// ============================================================================

/// Lifecycle stage of the poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Waiting,
    Voting,
    Locked,
    Revealed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "WAITING",
            Phase::Voting => "VOTING",
            Phase::Locked => "LOCKED",
            Phase::Revealed => "REVEALED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full snapshot pushed to every connection after each mutating event.
///
/// Field names are part of the wire contract consumed by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of connected voters (admins and displays are not counted)
    pub connected: u64,
    pub yes: u64,
    pub no: u64,
    /// Current phase
    pub step: Phase,
}

/// Outcome of a reveal: strict majority of "yes" passes, anything else fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    /// Ties resolve to [`Verdict::Fail`].
    pub fn from_tally(yes: u64, no: u64) -> Self {
        if yes > no {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealPayload {
    pub result: Verdict,
}

/// A recognised ballot value. Anything else sent with `vote` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    Yes,
    No,
}

impl VoteChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "yes" => Some(VoteChoice::Yes),
            "no" => Some(VoteChoice::No),
            _ => None,
        }
    }
}

// ============================================================================
// CLIENT -> SERVER
// ============================================================================

/// Events a client may send over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// **Vote**
    ///
    /// Raw ballot value. Only `"yes"` and `"no"` are counted, and only while
    /// the poll is in [`Phase::Voting`].
    #[serde(rename = "vote")]
    Vote(String),

    /// Open the poll for voting. Tallies are kept.
    #[serde(rename = "admin:start")]
    AdminStart,

    /// Close the poll; further votes are ignored.
    #[serde(rename = "admin:lock")]
    AdminLock,

    /// Compute and announce the verdict.
    #[serde(rename = "admin:reveal")]
    AdminReveal,

    /// Back to waiting with both tallies cleared.
    #[serde(rename = "admin:reset")]
    AdminReset,
}

impl ClientMessage {
    /// Whether this event is one of the `admin:*` commands.
    pub fn is_admin(&self) -> bool {
        !matches!(self, ClientMessage::Vote(_))
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Vote(_) => "vote",
            ClientMessage::AdminStart => "admin:start",
            ClientMessage::AdminLock => "admin:lock",
            ClientMessage::AdminReveal => "admin:reveal",
            ClientMessage::AdminReset => "admin:reset",
        }
    }

    pub fn to_text(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

// ============================================================================
// SERVER -> CLIENT
// ============================================================================

/// Events pushed by the server, either to one connection or to all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Sent to each new connection and broadcast on start, lock and reset.
    #[serde(rename = "state-change")]
    StateChange(Phase),

    #[serde(rename = "stats")]
    Stats(Stats),

    #[serde(rename = "reveal")]
    Reveal(RevealPayload),

    /// Tells clients to clear any local reveal or animation state.
    #[serde(rename = "reset")]
    Reset,
}

impl ServerMessage {
    pub fn to_text(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
