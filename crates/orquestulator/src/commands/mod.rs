//! CLI command handlers.

pub mod config;
pub mod eval;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use orquestulator_config::{ConfigSource, LoadedConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file; skips discovery when set.
    pub config_file: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Resolve configuration from `--config` or the discovered layers,
    /// with environment overrides applied either way.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let Some(path) = &self.config_file else {
            return orquestulator_config::load_config(None).context("failed to load configuration");
        };

        let mut config = orquestulator_config::load_config_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        orquestulator_config::apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;

        let warnings = orquestulator_config::config_warnings(&config);
        Ok(LoadedConfig {
            config,
            sources: vec![ConfigSource {
                path: path.clone(),
                loaded: true,
            }],
            warnings,
        })
    }
}
