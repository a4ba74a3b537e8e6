//! Activity tracking for sliding session expiry.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Tracks the last activity instant of each session.
///
/// Uses the tokio clock so expiry follows a paused test runtime.
#[derive(Debug)]
pub struct TtlTracker {
    last_activity: HashMap<String, Instant>,
    ttl: Option<Duration>,
}

impl TtlTracker {
    /// Create a tracker with the given window (`None` = never expire).
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            last_activity: HashMap::new(),
            ttl,
        }
    }

    /// Record activity for a session, restarting its window.
    pub fn touch(&mut self, session_id: &str) {
        self.last_activity
            .insert(session_id.to_string(), Instant::now());
    }

    /// Whether the session's window has elapsed.
    ///
    /// An untracked session counts as expired when a window is configured.
    pub fn is_expired(&self, session_id: &str) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        match self.last_activity.get(session_id) {
            None => true,
            Some(last) => last.elapsed() >= ttl,
        }
    }

    /// Stop tracking a session.
    pub fn remove(&mut self, session_id: &str) {
        self.last_activity.remove(session_id);
    }

    /// Remove every expired entry and return the ids.
    pub fn drain_expired(&mut self) -> Vec<String> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<String> = self
            .last_activity
            .iter()
            .filter(|(_, last)| now.duration_since(**last) >= ttl)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.last_activity.remove(id);
        }
        expired
    }
}
