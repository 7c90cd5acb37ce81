// src/cache/mod.rs
mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use std::time::Duration;

/// Key/value cache used by request handlers and probed by the health check.
#[async_trait]
pub trait Cache: Send + Sync + 'static {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}
