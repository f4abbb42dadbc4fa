//! # relay-core
//!
//! Foundation types for the chat relay.
//!
//! This crate provides the shared vocabulary the server crates depend on:
//!
//! - **Branded IDs**: [`ids::ConnectionId`] as a newtype over UUID v7
//! - **Wire events**: [`events::ClientEvent`] (inbound) and
//!   [`events::ServerEvent`] (outbound), tagged JSON matching the browser
//!   client's event names
//! - **Errors**: [`errors::RelayError`] hierarchy via `thiserror`
//! - **Logging**: [`logging::init_subscriber`] for `tracing` setup
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `relay-server` and `relayd`.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;

pub use errors::{RelayError, Result};
pub use events::{ClientEvent, ServerEvent};
pub use ids::ConnectionId;
