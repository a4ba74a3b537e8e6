//! Values mirrored into the server-side session.
//!
//! A [`SyncedValue`] holds a local copy of one session key. Reads are
//! always local; writes update the local copy synchronously and are pushed
//! to the session either after a quiet period (`set_debounced`) or right
//! away (`set_immediate`). Nothing is written until the first load has
//! finished, so a freshly opened view cannot clobber stored state with its
//! defaults.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::OrquestulatorClient;
use crate::error::Result;

/// Default quiet period before a debounced write is sent.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Storage a [`SyncedValue`] reads from and writes to.
#[async_trait]
pub trait SessionBackend: Send + Sync + 'static {
    /// Read one key; `None` when the session has no value for it.
    async fn load_value(&self, key: &str) -> Result<Option<Value>>;

    /// Replace one key.
    async fn store_value(&self, key: &str, value: Value) -> Result<()>;
}

#[async_trait]
impl SessionBackend for OrquestulatorClient {
    async fn load_value(&self, key: &str) -> Result<Option<Value>> {
        self.session().value(key).await
    }

    async fn store_value(&self, key: &str, value: Value) -> Result<()> {
        self.session().store_value(key, value).await.map(|_| ())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Options and state
// ─────────────────────────────────────────────────────────────────────────────

/// Behaviour of a [`SyncedValue`].
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Quiet period for debounced writes.
    pub debounce: Duration,
    /// Load the stored value during construction.
    pub auto_load: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            auto_load: true,
        }
    }
}

/// Whether the first load has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No load has completed; writes stay local.
    Unloaded,
    /// The stored value (or its absence) is known; writes are sent.
    Loaded,
}

struct Local<T> {
    value: T,
    phase: SyncPhase,
    load_error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SyncedValue
// ─────────────────────────────────────────────────────────────────────────────

/// A local value kept in step with one session key.
pub struct SyncedValue<T> {
    key: String,
    backend: Arc<dyn SessionBackend>,
    options: SyncOptions,
    local: Mutex<Local<T>>,
    /// Single-slot queue feeding the writer task; a newer value replaces
    /// one the writer has not picked up yet.
    writes: Arc<watch::Sender<Option<Value>>>,
    debounce: Mutex<Option<JoinHandle<()>>>,
}

impl<T> SyncedValue<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + 'static,
{
    /// Create a value for `key`, starting from `default`.
    ///
    /// Must be called inside a Tokio runtime. With `auto_load` the stored
    /// value is fetched before this returns; a failed load is recorded and
    /// available through [`load_error`](Self::load_error).
    pub async fn new(
        backend: Arc<dyn SessionBackend>,
        key: impl Into<String>,
        default: T,
        options: SyncOptions,
    ) -> Self {
        let key = key.into();
        let (tx, rx) = watch::channel(None);
        tokio::spawn(run_writer(Arc::clone(&backend), key.clone(), rx));

        let value = Self {
            key,
            backend,
            options,
            local: Mutex::new(Local {
                value: default,
                phase: SyncPhase::Unloaded,
                load_error: None,
            }),
            writes: Arc::new(tx),
            debounce: Mutex::new(None),
        };

        if options.auto_load {
            // Recorded in `load_error`.
            let _ = value.load().await;
        }
        value
    }

    /// The session key this value mirrors.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current local value.
    pub fn get(&self) -> T {
        self.local().value.clone()
    }

    pub fn phase(&self) -> SyncPhase {
        self.local().phase
    }

    /// Message of the last failed load, if any.
    pub fn load_error(&self) -> Option<String> {
        self.local().load_error.clone()
    }

    /// Read the stored value.
    ///
    /// A stored value replaces the local one; an absent key leaves the
    /// local value alone and writes nothing back. An authentication
    /// failure is swallowed and keeps writes disabled. Any other failure
    /// is recorded, returned, and enables writes.
    pub async fn load(&self) -> Result<()> {
        let outcome = self.backend.load_value(&self.key).await;

        let mut local = self.local();
        match outcome {
            Ok(Some(stored)) => match serde_json::from_value::<T>(stored) {
                Ok(value) => {
                    local.value = value;
                    local.load_error = None;
                    local.phase = SyncPhase::Loaded;
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "Stored session value has unexpected shape");
                    local.load_error = Some(e.to_string());
                    local.phase = SyncPhase::Loaded;
                    return Err(e.into());
                }
            },
            Ok(None) => {
                local.load_error = None;
                local.phase = SyncPhase::Loaded;
            }
            Err(e) if e.is_auth_error() => {
                tracing::debug!(key = %self.key, "Session not authenticated, skipping load");
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to load session value");
                local.load_error = Some(e.friendly_message());
                local.phase = SyncPhase::Loaded;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Replace the value and write it after the debounce period.
    pub fn set_debounced(&self, value: T) {
        self.update_debounced(|_| value);
    }

    /// Derive a new value from the current one and write it after the
    /// debounce period.
    pub fn update_debounced(&self, f: impl FnOnce(&T) -> T) {
        // Held across apply so the surviving timer carries the last value.
        let mut slot = self.debounce_slot();
        let Some(payload) = self.apply(f) else {
            return;
        };

        let writes = Arc::clone(&self.writes);
        let delay = self.options.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            writes.send_replace(Some(payload));
        });

        if let Some(previous) = slot.replace(timer) {
            previous.abort();
        }
    }

    /// Replace the value and write it now.
    pub fn set_immediate(&self, value: T) {
        self.update_immediate(|_| value);
    }

    /// Derive a new value from the current one and write it now.
    pub fn update_immediate(&self, f: impl FnOnce(&T) -> T) {
        let mut slot = self.debounce_slot();
        let Some(payload) = self.apply(f) else {
            return;
        };
        if let Some(timer) = slot.take() {
            timer.abort();
        }
        self.writes.send_replace(Some(payload));
    }

    /// Drop any scheduled debounced write. Writes already queued still go out.
    pub fn dispose(&self) {
        self.cancel_pending();
    }

    /// Update the local value and return what should be written, if
    /// anything.
    fn apply(&self, f: impl FnOnce(&T) -> T) -> Option<Value> {
        let mut local = self.local();
        local.value = f(&local.value);
        if local.phase == SyncPhase::Unloaded {
            return None;
        }
        match serde_json::to_value(&local.value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Session value is not serializable");
                None
            }
        }
    }
}

impl<T> SyncedValue<T> {
    fn local(&self) -> MutexGuard<'_, Local<T>> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock order: `debounce` before `local`.
    fn debounce_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.debounce.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_pending(&self) {
        if let Some(timer) = self.debounce_slot().take() {
            timer.abort();
        }
    }
}

impl<T> Drop for SyncedValue<T> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Sends queued values one at a time until every sender is gone and the
/// last queued value has been written.
async fn run_writer(
    backend: Arc<dyn SessionBackend>,
    key: String,
    mut rx: watch::Receiver<Option<Value>>,
) {
    while rx.changed().await.is_ok() {
        let Some(value) = rx.borrow_and_update().clone() else {
            continue;
        };
        match backend.store_value(&key, value).await {
            Ok(()) => tracing::trace!(key = %key, "Session value written"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to write session value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct MockBackend {
        stored: Mutex<HashMap<String, Value>>,
        writes: Mutex<Vec<(String, Value)>>,
        loads: Mutex<usize>,
        reject_auth: bool,
        fail_loads: bool,
    }

    impl MockBackend {
        fn writes(&self) -> Vec<(String, Value)> {
            self.writes.lock().unwrap().clone()
        }

        fn with_value(key: &str, value: Value) -> Self {
            let backend = Self::default();
            backend.stored.lock().unwrap().insert(key.to_string(), value);
            backend
        }
    }

    #[async_trait]
    impl SessionBackend for MockBackend {
        async fn load_value(&self, key: &str) -> Result<Option<Value>> {
            *self.loads.lock().unwrap() += 1;
            if self.reject_auth {
                return Err(Error::Auth("Not authenticated".to_string()));
            }
            if self.fail_loads {
                return Err(Error::Api {
                    status: 500,
                    code: "internal_error".to_string(),
                    message: "boom".to_string(),
                });
            }
            Ok(self.stored.lock().unwrap().get(key).cloned())
        }

        async fn store_value(&self, key: &str, value: Value) -> Result<()> {
            self.writes
                .lock()
                .unwrap()
                .push((key.to_string(), value.clone()));
            self.stored.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
    }

    fn options(auto_load: bool) -> SyncOptions {
        SyncOptions {
            debounce: Duration::from_millis(500),
            auto_load,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_load_reads_once_and_adopts_stored_value() {
        let backend = Arc::new(MockBackend::with_value("theme", json!("dark")));
        let value =
            SyncedValue::new(backend.clone(), "theme", "light".to_string(), options(true)).await;

        assert_eq!(value.get(), "dark");
        assert_eq!(value.phase(), SyncPhase::Loaded);
        assert_eq!(*backend.loads.lock().unwrap(), 1);
        settle().await;
        assert!(backend.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_key_keeps_default_without_writing() {
        let backend = Arc::new(MockBackend::default());
        let value = SyncedValue::new(backend.clone(), "limit", 10u32, options(true)).await;

        assert_eq!(value.get(), 10);
        assert_eq!(value.phase(), SyncPhase::Loaded);
        settle().await;
        assert!(backend.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_write_through_fresh_value() {
        let backend = Arc::new(MockBackend::default());
        let first = SyncedValue::new(backend.clone(), "expr", String::new(), options(true)).await;
        first.set_immediate("<% ctx(x) %>".to_string());
        settle().await;

        let second = SyncedValue::new(backend.clone(), "expr", String::new(), options(true)).await;
        assert_eq!(second.get(), "<% ctx(x) %>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_debounced_sets_write_last_value_once() {
        let backend = Arc::new(MockBackend::default());
        let value = SyncedValue::new(backend.clone(), "expr", String::new(), options(true)).await;

        for text in ["$", "$.", "$.a", "$.ab", "$.abc"] {
            value.set_debounced(text.to_string());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(backend.writes().is_empty());
        assert_eq!(value.get(), "$.abc");

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(backend.writes(), vec![("expr".to_string(), json!("$.abc"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_write_before_load() {
        let backend = Arc::new(MockBackend::with_value("n", json!(7)));
        let value = SyncedValue::new(backend.clone(), "n", 0i64, options(false)).await;
        assert_eq!(value.phase(), SyncPhase::Unloaded);

        value.set_immediate(1);
        value.set_debounced(2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(backend.writes().is_empty());
        assert_eq!(value.get(), 2);

        // The stored value wins over local edits made before the load.
        value.load().await.unwrap();
        assert_eq!(value.get(), 7);

        value.update_immediate(|n| n + 1);
        settle().await;
        assert_eq!(backend.writes(), vec![("n".to_string(), json!(8))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_is_swallowed_and_keeps_gate_closed() {
        let backend = Arc::new(MockBackend {
            reject_auth: true,
            ..Default::default()
        });
        let value = SyncedValue::new(backend.clone(), "k", json!(null), options(true)).await;

        assert_eq!(value.phase(), SyncPhase::Unloaded);
        assert!(value.load_error().is_none());
        assert!(value.load().await.is_ok());

        value.set_immediate(json!(1));
        settle().await;
        assert!(backend.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_load_failures_are_surfaced_and_open_gate() {
        let backend = Arc::new(MockBackend {
            fail_loads: true,
            ..Default::default()
        });
        let value = SyncedValue::new(backend.clone(), "k", 1u8, options(true)).await;

        assert_eq!(value.phase(), SyncPhase::Loaded);
        assert!(value.load_error().is_some());
        assert!(value.load().await.is_err());

        value.set_immediate(2);
        settle().await;
        assert_eq!(backend.writes(), vec![("k".to_string(), json!(2))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_write() {
        let backend = Arc::new(MockBackend::default());
        let value = SyncedValue::new(backend.clone(), "k", 0u8, options(true)).await;

        value.set_debounced(5);
        value.dispose();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.writes().is_empty());

        value.set_debounced(6);
        drop(value);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_handed_write_survives_drop() {
        let backend = Arc::new(MockBackend::default());
        let value = SyncedValue::new(backend.clone(), "k", 0u8, options(true)).await;

        value.set_immediate(3);
        drop(value);
        settle().await;
        assert_eq!(backend.writes(), vec![("k".to_string(), json!(3))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_write_supersedes_scheduled_one() {
        let backend = Arc::new(MockBackend::default());
        let value = SyncedValue::new(backend.clone(), "k", 0u8, options(true)).await;

        value.set_debounced(1);
        value.set_immediate(2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.writes(), vec![("k".to_string(), json!(2))]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_debounced_updates_write_final_local_value() {
        let backend = Arc::new(MockBackend::default());
        let options = SyncOptions {
            debounce: Duration::from_millis(50),
            auto_load: true,
        };
        let value = Arc::new(SyncedValue::new(backend.clone(), "n", 0u32, options).await);

        let writers: Vec<_> = (0..2u32)
            .map(|thread| {
                let value = Arc::clone(&value);
                tokio::task::spawn_blocking(move || {
                    for i in 0..200 {
                        value.set_debounced(thread * 1000 + i);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
        let writes = backend.writes();
        let (_, last) = writes.last().expect("a debounced write");
        assert_eq!(*last, json!(value.get()));
    }
}
