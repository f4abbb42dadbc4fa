//! WebSocket connection registry, lifecycle, event routing, and broadcasting.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod router;
pub mod session;
