//! Serve command - runs the API server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use orquestulator_config::load_connections_or_empty;
use orquestulator_server::{AppState, Server, ServerConfig};
use orquestulator_session::{MemorySessionStore, SessionStore, StoreConfig, spawn_cleanup_task};
use orquestulator_stackstorm::{ClientOptions, St2Client};

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// StackStorm connections file, JSON or YAML (overrides config)
    #[arg(long)]
    pub connections: Option<PathBuf>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    for warning in &loaded.warnings {
        warn!("{warning}");
    }
    if ctx.verbose {
        for path in loaded.loaded_from() {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    let mut config = loaded.config;
    let mut server_section = config.server();
    if let Some(bind) = args.bind {
        server_section.bind = bind;
    }
    if let Some(port) = args.port {
        server_section.port = port;
    }
    config.server = Some(server_section);

    let server_config = ServerConfig::from_config(&config)?;

    // Sessions
    let session = config.session();
    let store_config = StoreConfig::new()
        .with_max_sessions(session.max_sessions)
        .with_ttl(session.timeout())
        .with_proactive_cleanup(session.proactive_cleanup);
    let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(store_config));
    let sweeper = session
        .cleanup_interval()
        .map(|interval| spawn_cleanup_task(Arc::clone(&sessions), interval));

    // StackStorm
    let stackstorm = config.stackstorm();
    let connections_path = args
        .connections
        .unwrap_or_else(|| stackstorm.connections_file.clone());
    let mut warnings = Vec::new();
    let connections = load_connections_or_empty(&connections_path, &mut warnings);
    for warning in &warnings {
        warn!("{warning}");
    }
    info!(
        path = %connections_path.display(),
        count = connections.connections.len(),
        default = connections.default.as_deref().unwrap_or("-"),
        "StackStorm connections loaded"
    );
    let client = St2Client::new(ClientOptions::from(&stackstorm))?;

    let state = AppState::new(server_config, sessions, connections, client);
    let result = Server::from_state(state).run().await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    Ok(result?)
}
