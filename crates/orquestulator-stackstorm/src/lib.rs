//! StackStorm integration for Orquestulator.
//!
//! Sessions pick one of the configured connections (or enter a custom URL
//! and API key). [`ConnectionManager`] resolves the session's choice, falls
//! back to the configured default, and proxies the few StackStorm calls the
//! sandbox needs: a connectivity probe and execution lookups used to
//! pre-populate task results.

mod client;
mod error;
mod manager;

pub use client::{API_KEY_HEADER, ClientOptions, EXECUTION_LIST_LIMIT, Endpoint, St2Client};
pub use error::{Result, StackStormError};
pub use manager::{
    ConnectionInfo, ConnectionListing, ConnectionManager, ConnectionTest, CustomConnection,
    CustomConnectionView,
};
