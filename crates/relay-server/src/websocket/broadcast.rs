//! Event fan-out to connected WebSocket clients.

use std::sync::Arc;

use metrics::counter;
use relay_core::{ConnectionId, RelayError, Result, ServerEvent};
use tracing::{debug, warn};

use super::registry::ConnectionRegistry;

/// Delivers server events to connected clients.
///
/// Fan-out works on a registry snapshot, so a slow recipient never blocks
/// registration, removal, or delivery to anyone else. Clients that keep
/// dropping frames past the configured threshold are evicted.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    /// Dropped-frame threshold after which a slow client is evicted.
    max_client_drops: u64,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    pub fn new(registry: Arc<ConnectionRegistry>, max_client_drops: u64) -> Self {
        Self {
            registry,
            max_client_drops,
        }
    }

    /// Deliver an event to a single connection.
    pub async fn deliver_to_one(&self, id: &ConnectionId, event: &ServerEvent) -> Result<()> {
        let conn = self
            .registry
            .get(id)
            .await
            .ok_or_else(|| RelayError::UnknownConnection { id: id.clone() })?;
        let json = serde_json::to_string(event).map_err(|e| RelayError::DeliveryFailed {
            id: id.clone(),
            reason: format!("serialize failed: {e}"),
        })?;
        if conn.send(Arc::new(json)) {
            Ok(())
        } else {
            counter!("ws_frames_dropped_total").increment(1);
            Err(RelayError::DeliveryFailed {
                id: id.clone(),
                reason: "send channel full or closed".into(),
            })
        }
    }

    /// Deliver an event to every connection, the originator included.
    ///
    /// The event is serialized once and shared across recipients. A failed
    /// delivery is logged and counted but never aborts the rest of the
    /// fan-out. Returns the number of successful deliveries.
    pub async fn deliver_to_all(&self, event: &ServerEvent) -> usize {
        let json = match serde_json::to_string(event) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "failed to serialize event");
                return 0;
            }
        };

        let recipients = self.registry.all().await;
        debug!(
            event_type = event.event_type(),
            recipients = recipients.len(),
            "broadcast event to all"
        );

        let mut delivered = 0;
        let mut to_evict: Vec<ConnectionId> = Vec::new();
        for conn in &recipients {
            if conn.send(json.clone()) {
                delivered += 1;
            } else {
                counter!("ws_frames_dropped_total").increment(1);
                warn!(conn_id = %conn.id, drops = conn.drop_count(), "failed to send event to client");
                if conn.drop_count() >= self.max_client_drops {
                    to_evict.push(conn.id.clone());
                }
            }
        }

        for id in to_evict {
            warn!(conn_id = %id, threshold = self.max_client_drops, "evicting slow client");
            counter!("ws_slow_client_evictions_total").increment(1);
            let _ = self.registry.remove(&id).await;
        }

        counter!("ws_events_broadcast_total", "event_type" => event.event_type()).increment(1);
        delivered
    }
}
