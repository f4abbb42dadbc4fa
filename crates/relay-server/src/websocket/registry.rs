//! Connection registry — authoritative map of live connections.

use std::collections::HashMap;
use std::sync::Arc;

use relay_core::{ConnectionId, RelayError, Result};
use tokio::sync::RwLock;
use tracing::debug;

use super::connection::ClientConnection;

/// Tracks every live connection, keyed by connection ID.
///
/// The registry is the single source of truth for connection state: a
/// connection exists for the rest of the relay exactly as long as it is
/// registered here.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection, allocating its ID.
    ///
    /// The connection starts in the `Pending` state.
    pub async fn register(
        &self,
        tx: tokio::sync::mpsc::Sender<Arc<String>>,
    ) -> Arc<ClientConnection> {
        let connection = Arc::new(ClientConnection::new(ConnectionId::new(), tx));
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection.clone());
        connection
    }

    /// Look up a connection by ID.
    pub async fn get(&self, id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(id).cloned()
    }

    /// Set (or replace) a connection's display name.
    ///
    /// Errors with [`RelayError::UnknownConnection`] if the connection is
    /// absent or already closed. Name validation happens upstream in the
    /// event router.
    pub async fn set_name(&self, id: &ConnectionId, name: String) -> Result<()> {
        let conn = self
            .get(id)
            .await
            .ok_or_else(|| RelayError::UnknownConnection { id: id.clone() })?;
        if conn.set_display_name(name) {
            Ok(())
        } else {
            Err(RelayError::UnknownConnection { id: id.clone() })
        }
    }

    /// Remove a connection, closing it.
    ///
    /// Idempotent: returns `false` if the ID was not registered.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(id)
        };
        match removed {
            Some(conn) => {
                let _ = conn.close();
                debug!(conn_id = %id, "connection removed from registry");
                true
            }
            None => false,
        }
    }

    /// Snapshot of all live connections.
    ///
    /// Taken under the read lock and released before the caller iterates,
    /// so slow deliveries never hold up registration or removal.
    pub async fn all(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
