// src/health/probe.rs
use async_trait::async_trait;
use std::future::Future;

/// A single dependency check.
///
/// Implementations report failure through the returned error; the
/// aggregator turns errors, panics and timeouts into unhealthy results, so a
/// probe never needs to catch its own failures.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn check(&self) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Probe`].
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn check(&self) -> anyhow::Result<()> {
        (self.f)().await
    }
}

pub fn probe_fn<F, Fut>(f: F) -> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnProbe::new(f)
}
