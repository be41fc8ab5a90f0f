//! `sipua`: terminal softphone over the simulated SIP engine

mod logging;
mod render;
mod repl;
mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sipua_client_core::{Client, SimulatedEngine};
use tracing::{info, warn};

use crate::logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Client configuration file (TOML)
    #[arg(short, long, env = "SIPUA_CONFIG")]
    config: Option<PathBuf>,

    /// Stored account credentials (JSON)
    #[arg(long, env = "SIPUA_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// Default log filter, overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::setup_logging(&LoggingConfig {
        level: args.log_level.clone(),
        json: args.json_logs,
    })?;
    logging::log_welcome(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = settings::load_config(args.config.as_deref())?;
    let log_dir = &config.log_collection_path;
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let client = Client::start(SimulatedEngine::new(), config).context("Failed to start SIP client")?;

    // Without credentials the client still works, calls use the default route.
    match args.credentials.as_deref() {
        Some(path) => match settings::load_credentials(path) {
            Ok(credentials) => {
                info!(username = %credentials.username, server = %credentials.server, "Registering stored account");
                client.register_credentials(&credentials)?;
            }
            Err(e) => warn!(error = %format!("{:#}", e), "No registration"),
        },
        None => info!("No credentials given, calls use the default route"),
    }

    repl::run(client).await
}
