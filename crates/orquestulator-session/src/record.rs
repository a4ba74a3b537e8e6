//! Session records and the values stored in them.

use std::collections::HashMap;
use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Opaque session token.
///
/// 32 random bytes, URL-safe base64 without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The StackStorm connection a session has selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionSelection {
    /// A connection defined in the server's connection file.
    Named { id: String },
    /// An ad-hoc connection entered by the user.
    Custom {
        url: String,
        api_key: Option<String>,
    },
}

impl ConnectionSelection {
    /// Reserved id under which the custom connection is selected.
    pub const CUSTOM_ID: &'static str = "custom";

    pub fn named(id: impl Into<String>) -> Self {
        Self::Named { id: id.into() }
    }

    /// Build a custom selection, rejecting an empty URL.
    ///
    /// An empty API key is normalised to `None`.
    pub fn custom(url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(Error::InvalidConnection(
                "custom connection requires a URL".to_string(),
            ));
        }
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Ok(Self::Custom { url, api_key })
    }

    /// The id shown to clients: the named id, or `"custom"`.
    pub fn id(&self) -> &str {
        match self {
            Self::Named { id } => id,
            Self::Custom { .. } => Self::CUSTOM_ID,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Named { id } if id.trim().is_empty() => Err(Error::InvalidConnection(
                "connection id must not be empty".to_string(),
            )),
            Self::Custom { url, .. } if url.trim().is_empty() => Err(Error::InvalidConnection(
                "custom connection requires a URL".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// A single session's state.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,
    pub data: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub stackstorm_connection: Option<ConnectionSelection>,
}

impl SessionRecord {
    /// A fresh record with an empty data map.
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            data: HashMap::new(),
            created_at: now,
            last_seen_at: now,
            stackstorm_connection: None,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at,
            last_seen_at: self.last_seen_at,
        }
    }
}

/// Timestamps of a session, returned by [`SessionStore::touch`](crate::SessionStore::touch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}
