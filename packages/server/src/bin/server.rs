//! Tsukue room coordinator.
//!
//! Serves the WebSocket endpoint editor clients join rooms through, plus a small
//! read-only HTTP API for inspecting room state.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsukue-server
//! cargo run --bin tsukue-server -- --host 0.0.0.0 --port 3000 --server-execution
//! ```

use std::time::Duration;

use clap::Parser;
use tsukue_server::{config::CoordinatorConfig, ui::Server};
use tsukue_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "tsukue-server")]
#[command(about = "Real-time room coordinator for collaborative code editing", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Milliseconds an empty room is kept before its state is discarded
    #[arg(long, default_value = "100")]
    grace_period_ms: u64,

    /// Run submitted code on the server instead of relaying client results
    #[arg(long)]
    server_execution: bool,

    /// Upper bound for one server-side execution, in milliseconds
    #[arg(long, default_value = "5000")]
    execution_timeout_ms: u64,
}

impl From<&Args> for CoordinatorConfig {
    fn from(args: &Args) -> Self {
        Self {
            grace_period: Duration::from_millis(args.grace_period_ms),
            server_execution: args.server_execution,
            execution_timeout: Duration::from_millis(args.execution_timeout_ms),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = CoordinatorConfig::from(&args);
    tracing::debug!("{:?}", config);

    let server = Server::with_config(&config);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
