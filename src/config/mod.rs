// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let mut config = parse_config(path, &contents)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    config.validate()?;
    Ok(config)
}

/// Resolve the startup configuration: an explicit path must exist, the
/// default path is optional and falls back to built-in defaults.
pub async fn resolve_config(explicit: Option<String>) -> Result<Config> {
    match explicit {
        Some(path) => load_config(path).await,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH).await,
        None => {
            let mut config = Config::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
            config.validate()?;
            Ok(config)
        }
    }
}

fn parse_config(path: &Path, contents: &str) -> Result<Config> {
    let is_yaml = matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    );

    let config = if is_yaml {
        serde_yaml::from_str(contents).context("Failed to parse YAML config")?
    } else {
        serde_json::from_str(contents).context("Failed to parse JSON config")?
    };
    Ok(config)
}

/// Environment overrides for deployment-specific values.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("CORE_API_HOST") {
        config.server.host = host;
    }
    if let Some(port) = lookup("CORE_API_PORT") {
        config.server.port = port
            .parse()
            .with_context(|| format!("CORE_API_PORT is not a valid port: {port}"))?;
    }
    if let Some(filter) = lookup("CORE_API_LOG") {
        config.log.filter = filter;
    }
    Ok(())
}
