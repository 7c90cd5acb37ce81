// src/health/probes/http.rs
use crate::config::HttpCheckConfig;
use crate::health::Probe;
use crate::retry::RetryPolicy;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// GETs an upstream health endpoint; any non-2xx status is a failure.
pub struct HttpProbe {
    client: Client,
    url: Url,
    retry: Option<RetryPolicy>,
}

impl HttpProbe {
    /// `timeout` bounds each request, independent of the aggregator's
    /// per-probe timeout which also covers retries.
    pub fn new(url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url,
            retry: None,
        })
    }

    pub fn from_config(config: &HttpCheckConfig, timeout: Duration) -> Result<Self> {
        let mut probe = Self::new(config.url.clone(), timeout)?;
        probe.retry = config.retry.clone().map(RetryPolicy::new);
        Ok(probe)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    async fn get_once(&self) -> Result<()> {
        let response = self.client.get(self.url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {}", status);
        }
        Ok(())
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> Result<()> {
        match &self.retry {
            Some(retry) => retry.execute(self.url.as_str(), || self.get_once()).await,
            None => self.get_once().await,
        }
    }
}
