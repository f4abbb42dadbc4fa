//! Shutdown coordination.
//!
//! The serve loop watches the coordinator's [`CancellationToken`]; once
//! [`ShutdownCoordinator::shutdown`] fires, the listener stops accepting
//! and [`ShutdownCoordinator::drain`] waits for the remaining tasks to
//! wind down, bounded by the drain timeout.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits for outstanding tasks
/// unless overridden.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Signals shutdown to the accept loop and drains outstanding tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the default drain timeout.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    /// Override the drain timeout.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The token the serve loop watches.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and wait for `handles` to finish.
    ///
    /// Returns `false` if the drain timeout elapsed with tasks still
    /// running. Open WebSocket sessions keep the serve task alive until
    /// their peers hang up, so a timed-out drain is expected on a busy
    /// server and callers should exit anyway.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>) -> bool {
        self.shutdown();
        info!(tasks = handles.len(), "draining tasks");

        let all_done = futures::future::join_all(handles);
        if tokio::time::timeout(self.drain_timeout, all_done).await.is_err() {
            warn!(
                timeout = ?self.drain_timeout,
                "drain timed out, abandoning remaining tasks"
            );
            return false;
        }
        true
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert!(!ShutdownCoordinator::new().is_shutting_down());
    }

    #[test]
    fn shutdown_is_idempotent() {
        let coord = ShutdownCoordinator::new();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
    }

    #[test]
    fn token_observes_shutdown() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        assert!(!token.is_cancelled());
        coord.shutdown();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn drain_with_no_tasks_succeeds() {
        let coord = ShutdownCoordinator::new();
        assert!(coord.drain(vec![]).await);
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_releases_a_task_waiting_on_the_token() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();

        // Mimics the serve loop: runs until the token fires
        let serve = tokio::spawn(async move { token.cancelled().await });

        assert!(coord.drain(vec![serve]).await);
    }

    #[tokio::test]
    async fn drain_gives_up_on_a_stuck_task() {
        let coord = ShutdownCoordinator::new().with_drain_timeout(Duration::from_millis(50));

        // Ignores cancellation entirely
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        assert!(!coord.drain(vec![stuck]).await);
        assert!(coord.is_shutting_down());
    }
}
