//! Wire event types for the relay.
//!
//! Two event families, both JSON text frames tagged on `"type"`:
//!
//! - **[`ClientEvent`]**: inbound client→server events (`set-username`,
//!   `send-message`).
//! - **[`ServerEvent`]**: outbound server→client events
//!   (`connection-established`, `new-user`, `new-message`).
//!
//! The browser client relies on the exact type strings and field names;
//! payload fields use camelCase on the wire. Events are transient: nothing
//! is persisted, and a newly connecting client sees no backlog.

use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Inbound event from a connected client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Register or replace the display name for this connection.
    #[serde(rename = "set-username")]
    SetUsername {
        /// Requested display name. Must be non-empty after trimming.
        username: String,
    },

    /// Broadcast a chat message to all connected clients.
    #[serde(rename = "send-message")]
    SendMessage {
        /// Display name as the client believes it to be. Advisory only:
        /// the server always attributes the message to its own tracked
        /// name for the sending connection.
        #[serde(rename = "userName")]
        user_name: String,
        /// Message body.
        message: String,
    },
}

impl ClientEvent {
    /// Wire type string (for log lines and metrics labels).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SetUsername { .. } => "set-username",
            Self::SendMessage { .. } => "send-message",
        }
    }
}

/// Outbound event broadcast to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// First frame on every connection, carrying the assigned id.
    #[serde(rename = "connection-established")]
    ConnectionEstablished {
        /// The server-assigned connection id.
        #[serde(rename = "connectionId")]
        connection_id: ConnectionId,
    },

    /// A client registered a display name. Sent to all connections,
    /// including the one that set the name.
    #[serde(rename = "new-user")]
    NewUser {
        /// The newly set display name.
        username: String,
    },

    /// A chat message. Sent to all connections, including the sender.
    #[serde(rename = "new-message")]
    NewMessage {
        /// Display name of the sender at the time of the send.
        #[serde(rename = "userName")]
        user_name: String,
        /// Message body.
        message: String,
    },
}

impl ServerEvent {
    /// Wire type string (for log lines and metrics labels).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished { .. } => "connection-established",
            Self::NewUser { .. } => "new-user",
            Self::NewMessage { .. } => "new-message",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
