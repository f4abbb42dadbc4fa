//! Inbound event routing — validates client events and triggers broadcasts.

use std::sync::Arc;

use metrics::counter;
use relay_core::{ClientEvent, ConnectionId, RelayError, Result, ServerEvent};
use tracing::{debug, instrument};

use super::broadcast::Broadcaster;
use super::registry::ConnectionRegistry;

/// Routes inbound client events to their handlers.
///
/// Every error the router returns is handled locally by the session loop:
/// the offending event is dropped, nothing is broadcast, and the sending
/// connection stays up.
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl EventRouter {
    /// Create a router over the given registry and broadcaster.
    pub fn new(registry: Arc<ConnectionRegistry>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Handle one inbound event from the identified sender.
    #[instrument(skip_all, fields(sender = %sender, event_type = event.event_type()))]
    pub async fn route(&self, sender: &ConnectionId, event: ClientEvent) -> Result<()> {
        counter!("ws_events_routed_total", "event_type" => event.event_type()).increment(1);
        match event {
            ClientEvent::SetUsername { username } => self.set_username(sender, username).await,
            ClientEvent::SendMessage { user_name, message } => {
                self.send_message(sender, &user_name, message).await
            }
        }
    }

    /// Register a display name and announce it to everyone, the setter
    /// included.
    async fn set_username(&self, sender: &ConnectionId, username: String) -> Result<()> {
        let username = username.trim().to_owned();
        if username.is_empty() {
            return Err(RelayError::invalid_input("username is empty"));
        }

        self.registry.set_name(sender, username.clone()).await?;
        debug!(username, "username registered");

        let _ = self
            .broadcaster
            .deliver_to_all(&ServerEvent::NewUser { username })
            .await;
        Ok(())
    }

    /// Relay a chat message to everyone, the sender included.
    ///
    /// The `userName` carried in the client payload is advisory; the
    /// broadcast always uses the name the registry has on file for the
    /// sending connection.
    async fn send_message(
        &self,
        sender: &ConnectionId,
        claimed_name: &str,
        message: String,
    ) -> Result<()> {
        if message.trim().is_empty() {
            return Err(RelayError::invalid_input("message is empty"));
        }

        let conn = self
            .registry
            .get(sender)
            .await
            .ok_or_else(|| RelayError::UnknownConnection { id: sender.clone() })?;
        let Some(user_name) = conn.display_name() else {
            return Err(RelayError::NotNamed { id: sender.clone() });
        };

        if claimed_name != user_name {
            debug!(claimed = claimed_name, tracked = user_name, "client-supplied name mismatch");
        }

        let _ = self
            .broadcaster
            .deliver_to_all(&ServerEvent::NewMessage { user_name, message })
            .await;
        Ok(())
    }
}
