//! `eventide`: operator tool for an Eventide event store.

use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use eventide_core::clock::SystemClock;
use eventide_event_store::config::{BackendKind, StoreConfig, connect};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Initialize tracing subscriber. Logs go to stderr; stdout carries the
    // JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = StoreConfig::from_lookup(|name| cli.lookup(name))?;
    tracing::info!(backend = %config.backend, "connecting to event store");

    if cli.command == Command::Migrate && config.backend == BackendKind::Memory {
        tracing::warn!("in-memory store has no schema to migrate");
    }
    let store = connect(&config, Arc::new(SystemClock)).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    commands::execute(&cli.command, store.as_ref(), &mut out).await?;

    Ok(())
}
