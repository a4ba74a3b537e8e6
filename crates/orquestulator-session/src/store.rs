//! The session store abstraction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;
use crate::record::{ConnectionSelection, SessionId, SessionInfo};

/// Session counts reported by [`SessionStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Records currently held, including expired ones not yet swept.
    pub total_sessions: usize,
    /// Records whose expiry window has not elapsed.
    pub active_sessions: usize,
}

/// Storage for session records.
///
/// Every lookup of an unknown, expired, or evicted id fails with
/// [`Error::NotAuthenticated`](crate::Error::NotAuthenticated) and never
/// creates a record. Successful lookups count as activity and extend the
/// session's expiry window.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session with an empty data map.
    async fn create_session(&self) -> SessionId;

    /// Record activity on a session.
    async fn touch(&self, id: &str) -> Result<SessionInfo>;

    /// Read one data key. `Ok(None)` means the key was never written.
    async fn get(&self, id: &str, key: &str) -> Result<Option<Value>>;

    /// Snapshot of the whole data map.
    async fn data(&self, id: &str) -> Result<HashMap<String, Value>>;

    /// Replace one data key wholesale.
    async fn put(&self, id: &str, key: &str, value: Value) -> Result<()>;

    /// Replace several data keys; other keys are left alone.
    async fn put_many(&self, id: &str, entries: HashMap<String, Value>) -> Result<()> {
        for (key, value) in entries {
            self.put(id, &key, value).await?;
        }
        Ok(())
    }

    /// The session's StackStorm connection selection, if any.
    async fn connection(&self, id: &str) -> Result<Option<ConnectionSelection>>;

    /// Replace the session's StackStorm connection selection.
    async fn set_connection(&self, id: &str, selection: Option<ConnectionSelection>)
    -> Result<()>;

    /// Remove a session. Returns whether it existed.
    async fn remove(&self, id: &str) -> bool;

    /// Remove every expired session, returning how many were dropped.
    async fn cleanup_expired(&self) -> usize;

    async fn stats(&self) -> StoreStats;
}

/// Spawn a task that sweeps expired sessions every `interval`.
///
/// The task runs until the returned handle is aborted.
pub fn spawn_cleanup_task(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = store.cleanup_expired().await;
            if removed > 0 {
                debug!(removed, "Background sweep removed expired sessions");
            }
        }
    })
}
