//! Nebula reference relay and message store.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin nebula-server -- --port 8000
//! ```

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use nebula_shared::logger::setup_logger;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "nebula-server", version, about = "Nebula relay and message store")]
struct Args {
    /// Address to bind
    #[arg(long, env = "NEBULA_HOST", default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind
    #[arg(short, long, env = "NEBULA_PORT", default_value_t = 8000)]
    port: u16,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "NEBULA_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Run the server
    let addr = SocketAddr::new(args.host, args.port);
    if let Err(e) = nebula_server::run(addr).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
