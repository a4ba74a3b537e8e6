//! Configuration system for Orquestulator.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[auth]`, `[session]` and `[stackstorm]` sections
//! - Config file layering (XDG user config + project-local overrides)
//! - Environment variable overrides using the deployment variable names
//!   (`PASSPHRASE`, `SESSION_TIMEOUT_HOURS`, `AUTH_RATE_LIMIT`, ...)
//!
//! StackStorm connections live in a separate JSON or YAML file:
//!
//! ```json
//! {
//!   "default": "prod",
//!   "connections": [
//!     {"id": "prod", "alias": "Production", "url": "https://st2.example", "api_key": "..."}
//!   ]
//! }
//! ```

pub mod connections;
pub mod discovery;
pub mod env;
pub mod error;
pub mod types;

pub use connections::{
    ConnectionsFile, StackStormConnection, load_connections, load_connections_or_empty,
};
pub use discovery::{
    ConfigSource, LoadedConfig, config_warnings, load_config, load_config_file,
    load_config_with_options, xdg_config_dir, xdg_config_path,
};
pub use env::apply_env_overrides;
pub use error::{ConfigError, Result};
pub use types::*;
