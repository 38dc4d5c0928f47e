//! Session provider seam between the gateway and the platform connection.
//!
//! The gateway only ever talks to the platform through [`SessionProvider`].
//! Production deployments back it with a real socket client; this crate
//! ships [`InMemorySessionRegistry`], a registry with hand-toggled sessions
//! that records accepted patches, used by the service binary and by tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::appstate::AppStatePatch;

/// Session layer error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no connected session for user {0}")]
    NotConnected(String),
    #[error("patch send failed: {0}")]
    SendRejected(String),
    #[error("resync request failed: {0}")]
    ResyncRejected(String),
}

/// Connection to the platform on behalf of one or more users.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Whether the user currently has a connected session.
    async fn is_connected(&self, user_id: &str) -> bool;

    /// Send an app-state patch over the user's session.
    async fn send_patch(&self, user_id: &str, patch: AppStatePatch) -> Result<(), SessionError>;

    /// Ask the platform to redeliver the user's label state.
    async fn request_resync(&self, user_id: &str) -> Result<(), SessionError>;
}

/// In-memory session registry with failure injection and call counters.
#[derive(Default)]
pub struct InMemorySessionRegistry {
    inner: Mutex<RegistryInner>,
    send_calls: AtomicU64,
    resync_calls: AtomicU64,
    fail_sends: AtomicBool,
}

#[derive(Default)]
struct RegistryInner {
    connected: HashSet<String>,
    sent: Vec<(String, AppStatePatch)>,
}

impl InMemorySessionRegistry {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the user's session as connected.
    pub async fn connect(&self, user_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.connected.insert(user_id.to_string());
    }

    /// Mark the user's session as disconnected.
    pub async fn disconnect(&self, user_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.connected.remove(user_id);
    }

    /// Make subsequent `send_patch` calls fail without recording.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::Relaxed);
    }

    /// Number of `send_patch` calls, accepted or not.
    pub fn send_calls(&self) -> u64 {
        self.send_calls.load(Ordering::Relaxed)
    }

    /// Number of `request_resync` calls, accepted or not.
    pub fn resync_calls(&self) -> u64 {
        self.resync_calls.load(Ordering::Relaxed)
    }

    /// Patches accepted for the user, in send order.
    pub async fn sent_patches(&self, user_id: &str) -> Vec<AppStatePatch> {
        let inner = self.inner.lock().await;
        inner
            .sent
            .iter()
            .filter(|(user, _)| user == user_id)
            .map(|(_, patch)| patch.clone())
            .collect()
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionRegistry {
    async fn is_connected(&self, user_id: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.connected.contains(user_id)
    }

    async fn send_patch(&self, user_id: &str, patch: AppStatePatch) -> Result<(), SessionError> {
        self.send_calls.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().await;
        if !inner.connected.contains(user_id) {
            return Err(SessionError::NotConnected(user_id.to_string()));
        }
        if self.fail_sends.load(Ordering::Relaxed) {
            return Err(SessionError::SendRejected(
                "simulated send failure".to_string(),
            ));
        }
        debug!(user_id, index = ?patch.index, "recorded app-state patch");
        inner.sent.push((user_id.to_string(), patch));
        Ok(())
    }

    async fn request_resync(&self, user_id: &str) -> Result<(), SessionError> {
        self.resync_calls.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.lock().await;
        if !inner.connected.contains(user_id) {
            return Err(SessionError::NotConnected(user_id.to_string()));
        }
        debug!(user_id, "resync requested");
        Ok(())
    }
}
