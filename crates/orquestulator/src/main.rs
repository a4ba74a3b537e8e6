//! Orquestulator - expression workbench for StackStorm workflows
//!
//! Main entry point for the Orquestulator CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, eval, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Orquestulator - Orquesta, YAQL and Jinja2 expression workbench for StackStorm
#[derive(Parser)]
#[command(name = "orquestulator")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to load instead of the discovered ones
    #[arg(short, long, global = true, env = "ORQUESTULATOR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve(serve::ServeArgs),

    /// Evaluate an expression locally
    Eval(eval::EvalArgs),

    /// Configuration inspection
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "orquestulator=debug,orquestulator_server=debug,orquestulator_session=debug,orquestulator_stackstorm=debug,orquestulator_config=debug,info"
    } else {
        "orquestulator=info,orquestulator_server=info,orquestulator_stackstorm=info,warn"
    };

    let log_dir = orquestulator_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "orquestulator.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "orquestulator=trace,orquestulator_server=trace,orquestulator_session=trace,orquestulator_stackstorm=trace,orquestulator_eval=trace,orquestulator_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_file: cli.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Eval(args) => eval::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
