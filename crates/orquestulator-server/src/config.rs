//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use orquestulator_config::{OrquestulatorConfig, RateLimit, SameSitePolicy};

use crate::error::{Result, ServerError};

/// Default max body size for REST requests (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Session cookie attributes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSitePolicy,
    /// Browser-side lifetime; matches the session inactivity window.
    pub max_age: Duration,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: "session_id".to_string(),
            secure: false,
            same_site: SameSitePolicy::Lax,
            max_age: Duration::from_secs(4 * 3600),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// When false, `POST /api/session/auth` succeeds without a passphrase.
    pub passphrase_required: bool,

    pub passphrase: String,

    /// Limit on authentication attempts per client address.
    pub auth_rate_limit: RateLimit,

    /// Enable request logging.
    pub request_logging: bool,

    /// CORS allowed origins (empty = no CORS).
    pub cors_origins: Vec<String>,

    /// Maximum REST request body size in bytes.
    pub max_body_size: usize,

    pub cookie: CookieSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            passphrase_required: true,
            passphrase: orquestulator_config::DEFAULT_PASSPHRASE.to_string(),
            auth_rate_limit: RateLimit::default(),
            request_logging: true,
            cors_origins: Vec::new(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            cookie: CookieSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Create a config that requires `passphrase`, or no passphrase at all
    /// when `None`.
    pub fn new(passphrase: Option<String>) -> Self {
        match passphrase {
            Some(passphrase) => Self {
                passphrase,
                ..Default::default()
            },
            None => Self {
                passphrase_required: false,
                ..Default::default()
            },
        }
    }

    /// Build from the resolved application configuration.
    pub fn from_config(config: &OrquestulatorConfig) -> Result<Self> {
        let server = config.server();
        let auth = config.auth();
        let session = config.session();

        let bind_address = format!("{}:{}", server.bind, server.port)
            .parse()
            .map_err(|e| {
                ServerError::Config(format!(
                    "invalid bind address '{}:{}': {e}",
                    server.bind, server.port
                ))
            })?;

        Ok(Self {
            bind_address,
            passphrase_required: auth.passphrase_required,
            passphrase: auth.passphrase,
            auth_rate_limit: auth.rate_limit,
            request_logging: server.request_logging,
            cors_origins: server.cors_origins,
            max_body_size: server.max_body_size,
            cookie: CookieSettings {
                name: session.cookie_name.clone(),
                secure: session.cookie_secure,
                same_site: session.cookie_same_site,
                max_age: session.timeout(),
            },
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_auth_rate_limit(mut self, limit: RateLimit) -> Self {
        self.auth_rate_limit = limit;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    /// Set the maximum REST request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_cookie(mut self, cookie: CookieSettings) -> Self {
        self.cookie = cookie;
        self
    }
}
