//! # relayd
//!
//! Chat relay server binary — wires the relay crates together and starts
//! the HTTP/WebSocket server.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use relay_server::config::ServerConfig;
use relay_server::server::RelayServer;

/// Chat relay server.
#[derive(Parser, Debug)]
#[command(name = "relayd", about = "Chat relay server")]
struct Cli {
    /// Host to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind (0 for auto-assign).
    #[arg(long, default_value = "3000")]
    port: u16,

    /// Browser origin allowed by CORS.
    #[arg(long, default_value = "http://localhost:5173")]
    allow_origin: String,

    /// Minimum log level when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Maximum concurrent WebSocket connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    relay_core::logging::init_subscriber(&args.log_level);

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        allowed_origin: Some(args.allow_origin),
        max_connections: args.max_connections.unwrap_or(defaults.max_connections),
        ..defaults
    };

    let server = RelayServer::new(config);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;

    tracing::info!("Relay listening on http://{addr} (ws endpoint at /ws)");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if server.shutdown().drain(vec![handle]).await {
        tracing::info!("Shutdown complete");
    } else {
        tracing::warn!("Shutdown timed out, exiting with tasks still running");
    }
    Ok(())
}
