//! # Server Binary Entry Point
//!
//! Thin wrapper that loads configuration and runs the poll server.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server
//! cargo run --bin server -- --config config/server.toml --port 8080
//! PORT=8080 cargo run --bin server
//! ```
//!
//! Values given on the command line (or through `PORT` / `BIND`) override the
//! config file, which in turn overrides the built-in defaults.

use clap::Parser;
use log::info;

use audience_vote::common::logging::init_logger;
use audience_vote::server::{PollServer, ServerConfig};

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the server configuration file (TOML format)
    ///
    /// Example: config/server.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path);
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    }
    .with_overrides(args.bind, args.port);

    PollServer::new(config).run().await
}
