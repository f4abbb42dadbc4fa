//! End-to-end tests using a real listener and WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use relay_server::config::ServerConfig;
use relay_server::server::RelayServer;

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Boot a test server and return the base address + server handle.
async fn boot_server(config: ServerConfig) -> (String, Arc<RelayServer>) {
    let server = Arc::new(RelayServer::new(config));
    let (addr, _handle) = server.listen().await.unwrap();
    (addr.to_string(), server)
}

async fn boot_default() -> (String, Arc<RelayServer>) {
    boot_server(ServerConfig::default()).await
}

/// Connect a WebSocket client and consume the `connection-established`
/// frame, returning the stream and the assigned connection ID.
async fn connect(addr: &str) -> (WsStream, String) {
    let (mut ws, _) = connect_async(&format!("ws://{addr}/ws")).await.unwrap();
    let first = read_json(&mut ws).await;
    assert_eq!(first["type"], "connection-established");
    let conn_id = first["connectionId"].as_str().unwrap().to_string();
    (ws, conn_id)
}

/// Read the next text frame as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Try to read a JSON frame within `dur`. Returns `None` on timeout.
async fn try_read_json(ws: &mut WsStream, dur: Duration) -> Option<Value> {
    match timeout(dur, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(&text).ok();
                }
                Some(Ok(_)) => {}
                _ => return None,
            }
        }
    })
    .await
    {
        Ok(val) => val,
        Err(_) => None,
    }
}

async fn set_username(ws: &mut WsStream, name: &str) {
    let frame = json!({"type": "set-username", "username": name});
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn send_message(ws: &mut WsStream, user_name: &str, message: &str) {
    let frame = json!({"type": "send-message", "userName": user_name, "message": message});
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_connection_established_on_connect() {
    let (addr, server) = boot_default().await;
    let (mut ws, conn_id) = connect(&addr).await;
    assert!(!conn_id.is_empty());

    // No further frames until something happens
    assert!(try_read_json(&mut ws, Duration::from_millis(100)).await.is_none());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_each_connection_gets_unique_id() {
    let (addr, server) = boot_default().await;
    let (_ws1, id1) = connect(&addr).await;
    let (_ws2, id2) = connect(&addr).await;
    assert_ne!(id1, id2);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_health_endpoint() {
    let (addr, server) = boot_default().await;
    let (_ws, _id) = connect(&addr).await;

    let resp = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_new_user_broadcast_to_all_including_setter() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;

    set_username(&mut alice, "alice").await;

    let msg = read_json(&mut alice).await;
    assert_eq!(msg["type"], "new-user");
    assert_eq!(msg["username"], "alice");

    let msg = read_json(&mut bob).await;
    assert_eq!(msg["type"], "new-user");
    assert_eq!(msg["username"], "alice");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_message_reaches_everyone_including_sender() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;

    set_username(&mut alice, "alice").await;
    let _ = read_json(&mut alice).await;
    let _ = read_json(&mut bob).await;

    send_message(&mut alice, "alice", "hello everyone").await;

    let msg = read_json(&mut alice).await;
    assert_eq!(msg["type"], "new-message");
    assert_eq!(msg["userName"], "alice");
    assert_eq!(msg["message"], "hello everyone");

    let msg = read_json(&mut bob).await;
    assert_eq!(msg["type"], "new-message");
    assert_eq!(msg["message"], "hello everyone");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_unnamed_sender_message_goes_nowhere() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;
    set_username(&mut bob, "bob").await;
    let _ = read_json(&mut alice).await;
    let _ = read_json(&mut bob).await;

    // alice never set a username; her message must be dropped
    send_message(&mut alice, "alice", "too early").await;

    assert!(try_read_json(&mut bob, Duration::from_millis(300)).await.is_none());
    assert!(try_read_json(&mut alice, Duration::from_millis(100)).await.is_none());

    // The connection survives: naming and sending now works
    set_username(&mut alice, "alice").await;
    let msg = read_json(&mut alice).await;
    assert_eq!(msg["type"], "new-user");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_server_attributes_messages_itself() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    set_username(&mut alice, "alice").await;
    let _ = read_json(&mut alice).await;

    // Client lies about its name; the relay uses what it has on file
    send_message(&mut alice, "someone-else", "spoofed?").await;
    let msg = read_json(&mut alice).await;
    assert_eq!(msg["userName"], "alice");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_invalid_json_does_not_kill_connection() {
    let (addr, server) = boot_default().await;
    let (mut ws, _) = connect(&addr).await;

    ws.send(Message::text("this is not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"no-such-event"}"#))
        .await
        .unwrap();

    // Still functional afterwards
    set_username(&mut ws, "survivor").await;
    let msg = read_json(&mut ws).await;
    assert_eq!(msg["type"], "new-user");
    assert_eq!(msg["username"], "survivor");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_empty_username_is_dropped() {
    let (addr, server) = boot_default().await;
    let (mut ws, _) = connect(&addr).await;

    set_username(&mut ws, "   ").await;
    assert!(try_read_json(&mut ws, Duration::from_millis(300)).await.is_none());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_rename_announced_and_applied() {
    let (addr, server) = boot_default().await;
    let (mut ws, _) = connect(&addr).await;

    set_username(&mut ws, "alice").await;
    let _ = read_json(&mut ws).await;

    set_username(&mut ws, "alicia").await;
    let msg = read_json(&mut ws).await;
    assert_eq!(msg["type"], "new-user");
    assert_eq!(msg["username"], "alicia");

    send_message(&mut ws, "alicia", "new name, who dis").await;
    let msg = read_json(&mut ws).await;
    assert_eq!(msg["userName"], "alicia");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_per_sender_ordering_preserved() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;

    set_username(&mut alice, "alice").await;
    let _ = read_json(&mut alice).await;
    let _ = read_json(&mut bob).await;

    for i in 0..20 {
        send_message(&mut alice, "alice", &format!("msg_{i}")).await;
    }

    for i in 0..20 {
        let msg = read_json(&mut bob).await;
        assert_eq!(msg["message"], format!("msg_{i}"), "frame {i} out of order");
    }

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_disconnect_shrinks_fanout() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (bob, _) = connect(&addr).await;

    set_username(&mut alice, "alice").await;
    let _ = read_json(&mut alice).await;

    drop(bob);
    // Give the server a moment to reap the session
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.registry().connection_count().await, 1);

    // Remaining client still receives broadcasts
    send_message(&mut alice, "alice", "still here").await;
    let msg = read_json(&mut alice).await;
    assert_eq!(msg["message"], "still here");

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_connection_refused_at_capacity() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let (addr, server) = boot_server(config).await;

    let (_ws1, _) = connect(&addr).await;

    // Second connection must be refused before the upgrade
    let result = connect_async(&format!("ws://{addr}/ws")).await;
    assert!(result.is_err());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_plain_get_on_ws_route_is_client_error() {
    let (addr, server) = boot_default().await;

    let resp = reqwest::get(format!("http://{addr}/ws")).await.unwrap();
    assert!(resp.status().is_client_error());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_no_backlog_for_late_joiner() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    set_username(&mut alice, "alice").await;
    let _ = read_json(&mut alice).await;
    send_message(&mut alice, "alice", "before bob joined").await;
    let _ = read_json(&mut alice).await;

    // Bob joins after the message; he must see nothing of it
    let (mut bob, _) = connect(&addr).await;
    assert!(try_read_json(&mut bob, Duration::from_millis(300)).await.is_none());

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_three_way_broadcast() {
    let (addr, server) = boot_default().await;
    let (mut alice, _) = connect(&addr).await;
    let (mut bob, _) = connect(&addr).await;
    let (mut carol, _) = connect(&addr).await;

    set_username(&mut alice, "alice").await;
    for ws in [&mut alice, &mut bob, &mut carol] {
        let msg = read_json(ws).await;
        assert_eq!(msg["type"], "new-user");
    }

    send_message(&mut alice, "alice", "hi all").await;
    for ws in [&mut alice, &mut bob, &mut carol] {
        let msg = read_json(ws).await;
        assert_eq!(msg["type"], "new-message");
        assert_eq!(msg["message"], "hi all");
    }

    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_unresponsive_client_reaped_by_heartbeat() {
    let config = ServerConfig {
        heartbeat_interval_secs: 1,
        heartbeat_timeout_secs: 1,
        ..ServerConfig::default()
    };
    let (addr, server) = boot_server(config).await;

    // Hold the socket open but never poll it, so pings go unanswered
    let (unpolled, _) = connect(&addr).await;
    assert_eq!(server.registry().connection_count().await, 1);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(server.registry().connection_count().await, 0);

    drop(unpolled);
    server.shutdown().shutdown();
}

#[tokio::test]
async fn e2e_drain_waits_for_serve_task() {
    let server = Arc::new(RelayServer::new(ServerConfig::default()));
    let (addr, handle) = server.listen().await.unwrap();

    let (ws, _) = connect(&addr.to_string()).await;
    drop(ws);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(server.shutdown().drain(vec![handle]).await);
}

#[tokio::test]
async fn e2e_graceful_shutdown_stops_accepting() {
    let (addr, server) = boot_default().await;
    let (_ws, _) = connect(&addr).await;

    server.shutdown().shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // New connections are refused once shutdown begins
    let result = connect_async(&format!("ws://{addr}/ws")).await;
    assert!(result.is_err());
}
