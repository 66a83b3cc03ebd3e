//! # Client Binary Entry Point
//!
//! Command-line voter, admin console and event watcher for the poll server.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- watch
//! cargo run --bin client -- vote yes
//! cargo run --bin client -- start
//! cargo run --bin client -- --token s3cret reveal
//! ```
//!
//! Admin commands connect with role `admin`, `watch` connects as `display` so
//! it is not counted as a voter, and `vote` connects as a voter.

use anyhow::bail;
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::time::Duration;

use audience_vote::client::PollClient;
use audience_vote::common::logging::init_logger;
use audience_vote::common::messages::{ClientMessage, Phase, ServerMessage, Stats, VoteChoice};

/// How long a one-shot command waits for the server to confirm it.
const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the poll server
    #[arg(short, long, env = "POLL_URL", default_value = "ws://127.0.0.1:3000/ws")]
    url: String,

    /// Role to claim instead of the command's default
    #[arg(short, long)]
    role: Option<String>,

    /// Admin token, required when the server has one configured
    #[arg(short, long, env = "POLL_ADMIN_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every event until interrupted
    Watch,
    /// Cast a ballot ("yes" or "no")
    Vote { choice: String },
    /// Open voting
    Start,
    /// Stop accepting votes
    Lock,
    /// Announce the result
    Reveal,
    /// Clear the tallies and go back to waiting
    Reset,
}

impl Command {
    fn default_role(&self) -> &'static str {
        match self {
            Command::Watch => "display",
            Command::Vote { .. } => "voter",
            _ => "admin",
        }
    }

    fn message(&self) -> Option<ClientMessage> {
        match self {
            Command::Watch => None,
            Command::Vote { choice } => Some(ClientMessage::Vote(choice.clone())),
            Command::Start => Some(ClientMessage::AdminStart),
            Command::Lock => Some(ClientMessage::AdminLock),
            Command::Reveal => Some(ClientMessage::AdminReveal),
            Command::Reset => Some(ClientMessage::AdminReset),
        }
    }

    /// Whether `event` shows the server applied this command. `before` is the
    /// stats snapshot received when the connection was opened.
    fn confirmed_by(&self, event: &ServerMessage, before: &Stats) -> bool {
        match (self, event) {
            (Command::Start, ServerMessage::StateChange(phase)) => *phase == Phase::Voting,
            (Command::Lock, ServerMessage::StateChange(phase)) => *phase == Phase::Locked,
            (Command::Reset, ServerMessage::StateChange(phase)) => *phase == Phase::Waiting,
            (Command::Reveal, ServerMessage::Reveal(_)) => true,
            (Command::Vote { choice }, ServerMessage::Stats(stats)) => {
                match VoteChoice::parse(choice) {
                    Some(VoteChoice::Yes) => stats.yes > before.yes,
                    Some(VoteChoice::No) => stats.no > before.no,
                    None => false,
                }
            }
            _ => false,
        }
    }
}

fn describe(event: &ServerMessage) -> String {
    match event {
        ServerMessage::StateChange(phase) => format!("📢 Phase: {}", phase),
        ServerMessage::Stats(stats) => format!(
            "📊 {} | voters: {} | yes: {} | no: {}",
            stats.step, stats.connected, stats.yes, stats.no
        ),
        ServerMessage::Reveal(payload) => format!("🥁 Result: {:?}", payload.result),
        ServerMessage::Reset => "🔄 Reset".to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    if let Command::Vote { choice } = &args.command {
        if VoteChoice::parse(choice).is_none() {
            bail!("vote must be \"yes\" or \"no\", got {:?}", choice);
        }
    }

    let role = args
        .role
        .clone()
        .unwrap_or_else(|| args.command.default_role().to_string());
    let mut client = PollClient::connect(&args.url, Some(&role), args.token.as_deref()).await?;
    info!("🔗 Connected to {} as {}", args.url, role);

    let Some(message) = args.command.message() else {
        loop {
            tokio::select! {
                event = client.next_event() => match event? {
                    Some(event) => info!("{}", describe(&event)),
                    None => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                },
                _ = tokio::signal::ctrl_c() => break,
            }
        }
        return client.close().await;
    };

    // Greeting: state-change, then the stats snapshot used as the baseline
    let greeting = tokio::time::timeout(CONFIRM_TIMEOUT, async {
        while let Some(event) = client.next_event().await? {
            if let ServerMessage::Stats(stats) = event {
                return anyhow::Ok(Some(stats));
            }
        }
        anyhow::Ok(None)
    })
    .await;
    let before = match greeting {
        Ok(Ok(Some(stats))) => stats,
        Ok(Ok(None)) => bail!("server closed the connection before greeting"),
        Ok(Err(e)) => return Err(e),
        Err(_) => bail!("no greeting from server"),
    };

    client.send(&message).await?;

    // Commands the server ignores produce no matching event
    let confirmed = tokio::time::timeout(CONFIRM_TIMEOUT, async {
        while let Some(event) = client.next_event().await? {
            info!("{}", describe(&event));
            if args.command.confirmed_by(&event, &before) {
                return anyhow::Ok(true);
            }
        }
        anyhow::Ok(false)
    })
    .await;

    match confirmed {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => warn!("Server closed the connection"),
        Ok(Err(e)) => return Err(e),
        Err(_) => warn!("No confirmation from server; the command may have been ignored"),
    }

    client.close().await
}
