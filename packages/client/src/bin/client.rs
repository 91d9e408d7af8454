//! Nebula command line client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin nebula-client -- --room demo-room --name Alice
//! ```

use std::time::Duration;

use clap::Parser;
use nebula_client::config::{ClientConfig, DEFAULT_STUN_URL};
use nebula_shared::logger::setup_logger;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "nebula-client", version, about = "Nebula chat and call client")]
struct Args {
    /// Base URL of the Nebula server
    #[arg(short, long, env = "NEBULA_BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,

    /// Room to join at startup
    #[arg(short, long, env = "NEBULA_ROOM", default_value = "demo-room")]
    room: String,

    /// Display name
    #[arg(short, long, env = "NEBULA_NAME", default_value = "Guest")]
    name: String,

    /// STUN server (empty for host candidates only)
    #[arg(long, env = "NEBULA_STUN_URL", default_value = DEFAULT_STUN_URL)]
    stun_url: String,

    /// Seconds to wait before reconnecting a lost channel (0 disables)
    #[arg(long, env = "NEBULA_RECONNECT_SECS", default_value_t = 3)]
    reconnect_secs: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "NEBULA_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            backend_url: args.backend_url,
            room: args.room,
            name: args.name,
            stun_url: args.stun_url,
            reconnect_after: (args.reconnect_secs > 0)
                .then(|| Duration::from_secs(args.reconnect_secs)),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if let Err(e) = nebula_client::run_client(args.into()).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
