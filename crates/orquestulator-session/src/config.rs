//! Configuration for the session store.

use std::time::Duration;

/// Default maximum number of live sessions before LRU eviction.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default sliding expiry window (4 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(4 * 60 * 60);

/// Configuration for [`MemorySessionStore`](crate::MemorySessionStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of sessions kept before the least recently active one
    /// is evicted.
    pub max_sessions: usize,

    /// Sliding expiry window. `None` disables expiry.
    pub ttl: Option<Duration>,

    /// Drop expired sessions from the oldest end on every store operation.
    /// When false, expired sessions are only removed when they are accessed
    /// or by an explicit sweep.
    pub proactive_cleanup: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            ttl: Some(DEFAULT_TTL),
            proactive_cleanup: true,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of sessions.
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Set the sliding expiry window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Enable or disable proactive cleanup on each operation.
    pub fn with_proactive_cleanup(mut self, enabled: bool) -> Self {
        self.proactive_cleanup = enabled;
        self
    }
}
