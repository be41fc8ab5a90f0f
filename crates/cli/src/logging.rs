//! Tracing subscriber setup for the terminal

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Logging options taken from the command line
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `sipua_client_core=debug`
    pub level: String,
    pub json: bool,
}

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `level`. Logs go to stderr so they do not
/// interleave with the command prompt on stdout.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid log level: {}", config.level))?,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!("Starting {} v{}", app_name, version);
}
