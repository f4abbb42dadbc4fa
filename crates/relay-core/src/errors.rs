//! Error hierarchy for the relay.
//!
//! All four kinds are handled locally inside the relay core: none should
//! terminate the process or another connection's task, and nothing is
//! retried automatically. A rejected action simply produces no broadcast;
//! the acting client is not informed of the rejection.

use thiserror::Error;

use crate::ids::ConnectionId;

/// Convenience alias used throughout the relay crates.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors produced by the relay core.
#[derive(Debug, Error)]
pub enum RelayError {
    /// An operation referenced a connection id not present in the registry.
    ///
    /// Benign: expected when an event races with a disconnect. Logged and
    /// ignored.
    #[error("unknown connection {id}")]
    UnknownConnection {
        /// The id that was not found.
        id: ConnectionId,
    },

    /// An inbound event failed validation (empty username, empty message
    /// body, or unparseable frame). The connection survives.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },

    /// A message send was attempted before the connection set a username.
    /// The message is silently dropped.
    #[error("connection {id} has not set a username")]
    NotNamed {
        /// The pending connection that tried to send.
        id: ConnectionId,
    },

    /// One recipient was unreachable during fan-out. Isolated per
    /// recipient; never aborts delivery to the rest.
    #[error("delivery to {id} failed: {reason}")]
    DeliveryFailed {
        /// The recipient that could not be reached.
        id: ConnectionId,
        /// Why delivery failed (closed link, full buffer).
        reason: String,
    },
}

impl RelayError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownConnection { .. } => "UNKNOWN_CONNECTION",
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::NotNamed { .. } => "NOT_NAMED",
            Self::DeliveryFailed { .. } => "DELIVERY_FAILED",
        }
    }

    /// Whether this error is routine enough to log at `debug` rather
    /// than `warn`.
    ///
    /// `UnknownConnection` and `NotNamed` occur in normal operation
    /// (races with disconnects, clients sending before naming).
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::UnknownConnection { .. } | Self::NotNamed { .. })
    }

    /// Shorthand for an [`RelayError::InvalidInput`].
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
