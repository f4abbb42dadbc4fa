//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use relay_core::ConnectionId;
use tokio::sync::mpsc;

/// Lifecycle state of a client connection.
///
/// Transitions are one-way into `Closed`; a closed connection never
/// re-enters the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected but anonymous. May set a username; may not send messages.
    Pending,
    /// Username registered. Full participant in the chat.
    Named(String),
    /// Disconnected. Terminal.
    Closed,
}

/// Represents a connected WebSocket client.
pub struct ClientConnection {
    /// Unique connection ID, stable for the connection's lifetime.
    pub id: ConnectionId,
    /// Lifecycle state (includes the display name once set).
    state: Mutex<ConnectionState>,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Whether the client has responded to the last ping.
    pub is_alive: AtomicBool,
    /// When the last Pong (or any activity) was received.
    last_pong: Mutex<Instant>,
    /// Count of frames dropped due to full channel.
    pub dropped_frames: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection in the `Pending` state.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        let now = Instant::now();
        Self {
            id,
            state: Mutex::new(ConnectionState::Pending),
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_pong: Mutex::new(now),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    /// Set (or replace) the display name, moving `Pending` to `Named`.
    ///
    /// Returns `false` if the connection is already closed.
    pub fn set_display_name(&self, name: String) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Closed {
            return false;
        }
        *state = ConnectionState::Named(name);
        true
    }

    /// The registered display name, if any.
    pub fn display_name(&self) -> Option<String> {
        match &*self.state.lock() {
            ConnectionState::Named(name) => Some(name.clone()),
            ConnectionState::Pending | ConnectionState::Closed => None,
        }
    }

    /// Whether the connection has a registered display name.
    pub fn is_named(&self) -> bool {
        matches!(&*self.state.lock(), ConnectionState::Named(_))
    }

    /// Move the connection to `Closed`.
    ///
    /// Idempotent: returns `true` only on the first call.
    pub fn close(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Closed {
            return false;
        }
        *state = ConnectionState::Closed;
        true
    }

    /// Send a serialized frame to the client.
    ///
    /// Non-blocking: returns `false` if the channel is full or closed, and
    /// increments the dropped frame counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Mark the connection as alive (pong received).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_pong.lock() = Instant::now();
    }

    /// Duration since the last pong (or connection establishment).
    pub fn last_pong_elapsed(&self) -> Duration {
        self.last_pong.lock().elapsed()
    }

    /// Check and reset the alive flag for heartbeat.
    ///
    /// Returns `true` if the connection was alive since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
