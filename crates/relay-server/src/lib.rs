//! # relay-server
//!
//! Axum HTTP + `WebSocket` chat relay.
//!
//! - HTTP endpoints: health check
//! - `WebSocket` gateway: connection registry, lifecycle, heartbeat
//! - Event routing: `set-username` / `send-message` dispatch with local
//!   error handling (a rejected event never kills the connection)
//! - Broadcast fan-out to every connected client, sender included
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;
