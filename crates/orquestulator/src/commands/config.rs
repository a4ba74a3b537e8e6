//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};

use orquestulator_config::load_connections_or_empty;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommand>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration with secrets masked (default)
    Show,

    /// Show which config files are checked and which were loaded
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command.unwrap_or(ConfigCommand::Show) {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("# Orquestulator Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("# No config files loaded (using defaults)");
    } else {
        for path in sources {
            println!("# Loaded: {}", path.display());
        }
    }
    for warning in &loaded.warnings {
        println!("# Warning: {warning}");
    }
    println!();
    print!("{}", loaded.config.masked().to_toml()?);

    let stackstorm = loaded.config.stackstorm();
    let mut warnings = Vec::new();
    let connections = load_connections_or_empty(&stackstorm.connections_file, &mut warnings);
    println!("\n# StackStorm connections ({})", stackstorm.connections_file.display());
    for warning in &warnings {
        println!("# Warning: {warning}");
    }
    for conn in &connections.connections {
        let marker = if connections.default.as_deref() == Some(conn.id.as_str()) {
            " (default)"
        } else {
            ""
        };
        let key = if conn.api_key.is_some() { "set" } else { "none" };
        println!(
            "#   {} - {} <{}> api_key: {}{}",
            conn.id,
            conn.display_name(),
            conn.url,
            key,
            marker
        );
    }
    if ctx.verbose {
        println!("# Plaintext API keys: {:?}", connections.plaintext_key_ids());
    }
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    for source in &loaded.sources {
        let state = if source.loaded { "loaded" } else { "missing" };
        println!("{:8} {}", state, source.path.display());
    }
    Ok(())
}

fn cmd_path() -> Result<()> {
    match orquestulator_config::xdg_config_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(no config directory available)"),
    }
    Ok(())
}
