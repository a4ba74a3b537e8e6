//! Session store for Orquestulator.
//!
//! Sessions are opaque tokens bound to a cookie. Each session carries an
//! independent key/value map of UI state plus the StackStorm connection the
//! user selected. Records expire on a sliding window: every successful
//! access extends the session's lifetime.
//!
//! - [`SessionStore`] is the injectable trait used by the HTTP layer
//! - [`MemorySessionStore`] is the default process-local implementation,
//!   bounded by an LRU capacity
//!
//! # Example
//!
//! ```rust,ignore
//! use orquestulator_session::{MemorySessionStore, SessionStore, StoreConfig};
//!
//! let store = MemorySessionStore::new(
//!     StoreConfig::default().with_ttl(Duration::from_secs(4 * 3600)),
//! );
//! let id = store.create_session().await;
//! store.put(id.as_str(), "yaql_query", json!("$.foo")).await?;
//! ```

mod config;
mod error;
mod memory;
mod record;
mod store;
mod ttl;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use memory::MemorySessionStore;
pub use record::{ConnectionSelection, SessionId, SessionInfo, SessionRecord};
pub use store::{SessionStore, StoreStats, spawn_cleanup_task};
pub use ttl::TtlTracker;
