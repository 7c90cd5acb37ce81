// src/health/probes/mod.rs
mod cache;
mod http;
mod postgres;
mod redis;

pub use cache::CacheProbe;
pub use http::HttpProbe;
pub use postgres::PostgresProbe;
pub use redis::RedisProbe;

use super::ProbeRegistry;
use crate::cache::Cache;
use crate::config::Config;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Register the probes the configuration asks for. Optional dependencies
/// are registered only when their section is present.
pub fn build_registry(config: &Config, cache: Arc<dyn Cache>) -> Result<ProbeRegistry> {
    let mut registry = ProbeRegistry::new();

    if let Some(database) = &config.database {
        registry.register("database", PostgresProbe::connect_lazy(database)?)?;
    }

    if config.cache.enabled {
        registry.register("cache", CacheProbe::new(cache, config.cache.ttl()))?;
    }

    if let Some(redis) = &config.redis {
        registry.register("redis", RedisProbe::from_config(redis)?)?;
    }

    for check in &config.health.http_checks {
        let probe = HttpProbe::from_config(check, config.health.probe_timeout())
            .with_context(|| format!("Failed to build http check '{}'", check.name))?;
        registry.register(check.name.clone(), probe)?;
    }

    info!(
        probes = ?registry.names().collect::<Vec<_>>(),
        "health probes registered"
    );
    Ok(registry)
}
