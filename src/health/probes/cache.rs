// src/health/probes/cache.rs
use crate::cache::Cache;
use crate::health::Probe;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const PROBE_KEY: &str = "health_check";
const PROBE_VALUE: &str = "ok";

/// Round-trips a short-lived key through the cache.
pub struct CacheProbe {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl CacheProbe {
    pub fn new(cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait]
impl Probe for CacheProbe {
    async fn check(&self) -> Result<()> {
        self.cache.set(PROBE_KEY, PROBE_VALUE, self.ttl).await?;

        match self.cache.get(PROBE_KEY).await? {
            Some(value) if value == PROBE_VALUE => Ok(()),
            _ => bail!("Cache get/set failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    /// Accepts writes but never returns them.
    struct BlackHoleCache;

    #[async_trait]
    impl Cache for BlackHoleCache {
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Ok(())
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
    }

    struct RefusingCache;

    #[async_trait]
    impl Cache for RefusingCache {
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            bail!("connection refused")
        }

        async fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("connection refused")
        }

        async fn delete(&self, _key: &str) -> Result<bool> {
            bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let probe = CacheProbe::new(Arc::new(MemoryCache::new()), Duration::from_secs(1));
        assert!(probe.check().await.is_ok());
    }

    #[tokio::test]
    async fn test_lost_write_is_reported() {
        let probe = CacheProbe::new(Arc::new(BlackHoleCache), Duration::from_secs(1));
        let err = probe.check().await.unwrap_err();
        assert_eq!(err.to_string(), "Cache get/set failed");
    }

    #[tokio::test]
    async fn test_cache_error_is_propagated() {
        let probe = CacheProbe::new(Arc::new(RefusingCache), Duration::from_secs(1));
        let err = probe.check().await.unwrap_err();
        assert_eq!(err.to_string(), "connection refused");
    }
}
