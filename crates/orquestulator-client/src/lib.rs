//! HTTP client SDK for the Orquestulator API.
//!
//! This crate provides a typed client for the Orquestulator server plus
//! [`SyncedValue`], which keeps a local value in step with one key of the
//! server-side session.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use orquestulator_client::{OrquestulatorClient, Result, SyncOptions, SyncedValue};
//!
//! # async fn example() -> Result<()> {
//! let client = OrquestulatorClient::builder()
//!     .base_url("http://localhost:8000")
//!     .on_session_expired(|| eprintln!("session expired, please log in again"))
//!     .build()?;
//!
//! client.session().authenticate(Some("Ch@ngeMe")).await?;
//!
//! let result = client
//!     .evaluate()
//!     .orquesta("<% ctx(host) %>", serde_json::json!({ "host": "web-01" }))
//!     .await?;
//! println!("{result}");
//!
//! // Editor state survives reloads.
//! let expression = SyncedValue::new(
//!     Arc::new(client.clone()),
//!     "orquesta_expression",
//!     String::new(),
//!     SyncOptions::default(),
//! )
//! .await;
//! expression.set_debounced("<% ctx(host) %>".to_string());
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Session**: Authenticate, status, data read/merge, counts
//! - **Evaluate**: Orquesta, YAQL and Jinja2 expressions
//! - **StackStorm**: Connection selection and testing, executions
//! - **Health**: Server health checks

pub mod api;
pub mod client;
pub mod error;
pub mod sync;
pub mod types;

pub use client::{ClientBuilder, OrquestulatorClient, SessionExpiredHook};
pub use error::{Error, Result};
pub use sync::{SessionBackend, SyncOptions, SyncPhase, SyncedValue};
pub use types::*;
