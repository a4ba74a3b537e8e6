//! Application state shared across handlers.

use std::sync::Arc;

use orquestulator_config::ConnectionsFile;
use orquestulator_eval::Evaluator;
use orquestulator_session::{MemorySessionStore, SessionStore};
use orquestulator_stackstorm::{ClientOptions, ConnectionManager, St2Client};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::ratelimit::{SharedKeyedLimiter, create_auth_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Session records keyed by cookie token.
    pub sessions: Arc<dyn SessionStore>,

    pub evaluator: Arc<Evaluator>,

    /// Per-session StackStorm connection handling.
    pub stackstorm: ConnectionManager,

    /// Limits `POST /api/session/auth` per client address.
    pub auth_limiter: SharedKeyedLimiter,
}

impl AppState {
    /// Create application state around an existing session store.
    pub fn new(
        config: ServerConfig,
        sessions: Arc<dyn SessionStore>,
        connections: ConnectionsFile,
        client: St2Client,
    ) -> Self {
        let auth_limiter = create_auth_limiter(config.auth_rate_limit);
        let stackstorm = ConnectionManager::new(connections, Arc::clone(&sessions), client);
        Self {
            config: Arc::new(config),
            sessions,
            evaluator: Arc::new(Evaluator::new()),
            stackstorm,
            auth_limiter,
        }
    }

    /// State with a default in-memory store and StackStorm client, as used
    /// by tests and the local CLI.
    pub fn in_memory(config: ServerConfig, connections: ConnectionsFile) -> Result<Self> {
        let client = St2Client::new(ClientOptions::default())
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self::new(
            config,
            Arc::new(MemorySessionStore::default()),
            connections,
            client,
        ))
    }

    /// Replace the expression evaluator.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
