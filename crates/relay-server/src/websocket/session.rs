//! WebSocket session lifecycle — handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use relay_core::{ClientEvent, ServerEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;

use super::registry::ConnectionRegistry;
use super::router::EventRouter;

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection (allocating its ID)
/// 2. Sends a `connection-established` frame carrying that ID
/// 3. Forwards outbound frames via the send channel
/// 4. Routes incoming text frames as chat events
/// 5. Sends periodic Ping frames and disconnects unresponsive clients
/// 6. Cleans up on disconnect
pub async fn run_ws_session(
    ws: WebSocket,
    registry: Arc<ConnectionRegistry>,
    router: Arc<EventRouter>,
    config: Arc<ServerConfig>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    // Register the connection and its send channel
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(config.send_buffer);
    let connection = registry.register(send_tx).await;
    let conn_id = connection.id.clone();

    let connection_start = std::time::Instant::now();
    let client_count = registry.connection_count().await;
    info!(conn_id = %conn_id, client_count, "client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    // First frame: tell the client its assigned ID
    let established = ServerEvent::ConnectionEstablished {
        connection_id: conn_id.clone(),
    };
    if let Ok(json) = serde_json::to_string(&established) {
        let _ = ws_tx.send(Message::Text(json.into())).await;
    }

    // Session-scoped cancellation: whenever the outbound forwarder ends
    // (unresponsive peer, closed channel, failed write) the inbound loop
    // must end too so cleanup runs even if the peer stays silent.
    let cancel = CancellationToken::new();

    // Spawn outbound forwarder with periodic Ping frames.
    let ping_interval = config.heartbeat_interval();
    let pong_timeout = config.heartbeat_timeout();
    let outbound_conn = connection.clone();
    let outbound_cancel = cancel.clone();
    let outbound = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        // Skip the immediate first tick
        let _ = ticker.tick().await;

        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    match frame {
                        Some(text) => {
                            if ws_tx.send(Message::Text(text.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    // Check if client responded to previous ping
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > pong_timeout
                    {
                        warn!(
                            conn_id = %outbound_conn.id,
                            "client unresponsive for {pong_timeout:?}, disconnecting"
                        );
                        counter!("ws_heartbeat_disconnects_total").increment(1);
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        outbound_cancel.cancel();
    });

    // Process incoming frames
    loop {
        let msg = tokio::select! {
            () = cancel.cancelled() => break,
            incoming = ws_rx.next() => match incoming {
                Some(Ok(msg)) => msg,
                _ => break,
            },
        };
        // Extract text from either Text or Binary frames
        let text = match msg {
            Message::Text(ref t) => Some(t.to_string()),
            Message::Binary(ref data) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    Some(s.to_string())
                } else {
                    debug!(conn_id = %conn_id, len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!(conn_id = %conn_id, "client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                // Unparseable frame: drop it, the connection survives
                warn!(conn_id = %conn_id, error = %e, "invalid event frame");
                counter!("ws_invalid_frames_total").increment(1);
                continue;
            }
        };

        if let Err(e) = router.route(&conn_id, event).await {
            if e.is_benign() {
                debug!(conn_id = %conn_id, code = e.code(), error = %e, "event dropped");
            } else {
                warn!(conn_id = %conn_id, code = e.code(), error = %e, "event rejected");
            }
        }
    }

    // Clean up
    outbound.abort();
    let _ = registry.remove(&conn_id).await;
    let client_count = registry.connection_count().await;
    info!(conn_id = %conn_id, client_count, "client disconnected");
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(connection_start.elapsed().as_secs_f64());
}
