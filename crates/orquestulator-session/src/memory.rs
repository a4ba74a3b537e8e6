//! Process-local session store with LRU capacity and sliding expiry.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lru::LruCache;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::record::{ConnectionSelection, SessionId, SessionInfo, SessionRecord};
use crate::store::{SessionStore, StoreStats};
use crate::ttl::TtlTracker;

/// State protected by the lock.
///
/// Every successful access promotes the record in the LRU, so LRU order is
/// also activity order. Proactive cleanup relies on this to stop at the
/// first live record.
struct StoreInner {
    lru: LruCache<String, SessionRecord>,
    ttl: TtlTracker,
}

impl StoreInner {
    /// Drop expired sessions from the least recently active end.
    fn expire_oldest(&mut self) -> usize {
        let mut removed = 0;
        while let Some(id) = self.lru.peek_lru().map(|(id, _)| id.clone()) {
            if !self.ttl.is_expired(&id) {
                break;
            }
            self.lru.pop(&id);
            self.ttl.remove(&id);
            removed += 1;
        }
        if removed > 0 {
            debug!(removed, "Expired sessions dropped");
        }
        removed
    }

    /// Resolve a live record and count the lookup as activity.
    fn live(&mut self, id: &str) -> Result<&mut SessionRecord> {
        if self.ttl.is_expired(id) {
            if self.lru.pop(id).is_some() {
                debug!("Session expired on access");
            }
            self.ttl.remove(id);
            return Err(Error::NotAuthenticated);
        }
        let record = self.lru.get_mut(id).ok_or(Error::NotAuthenticated)?;
        record.last_seen_at = Utc::now();
        self.ttl.touch(id);
        Ok(record)
    }
}

/// In-memory [`SessionStore`].
///
/// Sessions live for the lifetime of the process. Cloning is cheap and
/// clones share state.
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<StoreInner>>,
    config: StoreConfig,
}

impl MemorySessionStore {
    pub fn new(config: StoreConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_sessions).unwrap_or(NonZeroUsize::MIN);
        let inner = StoreInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(config.ttl),
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
            config,
        }
    }

    /// Lock for writing and apply proactive cleanup if enabled.
    async fn lock(&self) -> tokio::sync::RwLockWriteGuard<'_, StoreInner> {
        let mut inner = self.inner.write().await;
        if self.config.proactive_cleanup {
            inner.expire_oldest();
        }
        inner
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self) -> SessionId {
        let mut inner = self.lock().await;
        let id = SessionId::generate();
        let key = id.as_str().to_string();
        if let Some((evicted, _)) = inner.lru.push(key.clone(), SessionRecord::new(id.clone())) {
            // `push` also returns the old value when the key already existed.
            if evicted != key {
                debug!("Evicted least recently active session to make room");
                inner.ttl.remove(&evicted);
            }
        }
        inner.ttl.touch(&key);
        trace!(sessions = inner.lru.len(), "Session created");
        id
    }

    async fn touch(&self, id: &str) -> Result<SessionInfo> {
        let mut inner = self.lock().await;
        Ok(inner.live(id)?.info())
    }

    async fn get(&self, id: &str, key: &str) -> Result<Option<Value>> {
        let mut inner = self.lock().await;
        Ok(inner.live(id)?.data.get(key).cloned())
    }

    async fn data(&self, id: &str) -> Result<HashMap<String, Value>> {
        let mut inner = self.lock().await;
        Ok(inner.live(id)?.data.clone())
    }

    async fn put(&self, id: &str, key: &str, value: Value) -> Result<()> {
        let mut inner = self.lock().await;
        inner.live(id)?.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn put_many(&self, id: &str, entries: HashMap<String, Value>) -> Result<()> {
        let mut inner = self.lock().await;
        let record = inner.live(id)?;
        trace!(keys = entries.len(), "Storing session data");
        record.data.extend(entries);
        Ok(())
    }

    async fn connection(&self, id: &str) -> Result<Option<ConnectionSelection>> {
        let mut inner = self.lock().await;
        Ok(inner.live(id)?.stackstorm_connection.clone())
    }

    async fn set_connection(
        &self,
        id: &str,
        selection: Option<ConnectionSelection>,
    ) -> Result<()> {
        if let Some(selection) = &selection {
            selection.validate()?;
        }
        let mut inner = self.lock().await;
        inner.live(id)?.stackstorm_connection = selection;
        Ok(())
    }

    async fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        inner.ttl.remove(id);
        inner.lru.pop(id).is_some()
    }

    async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired = inner.ttl.drain_expired();
        let mut removed = 0;
        for id in expired {
            if inner.lru.pop(&id).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    /// Counts records as stored, without sweeping first, so expired
    /// sessions awaiting cleanup show up in `total_sessions`.
    async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        let active = inner
            .lru
            .iter()
            .filter(|(id, _)| !inner.ttl.is_expired(id))
            .count();
        StoreStats {
            total_sessions: inner.lru.len(),
            active_sessions: active,
        }
    }
}
