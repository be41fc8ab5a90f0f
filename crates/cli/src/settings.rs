//! Configuration and credential files

use std::path::Path;

use anyhow::{Context, Result};
use sipua_client_core::{ClientConfig, Credentials};

/// Read a TOML client configuration, or use defaults without a file
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<ClientConfig>(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    config.validate().context("Invalid client configuration")?;
    Ok(config)
}

/// Read the stored credential document
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials {}", path.display()))?;
    Credentials::from_json(&text)
        .with_context(|| format!("Failed to parse credentials {}", path.display()))
}
