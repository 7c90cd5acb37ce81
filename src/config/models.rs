// src/config/models.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Secondary cache; the redis probe is only registered when this is set.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub http_checks: Vec<HttpCheckConfig>,
}

impl HealthConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: default_probe_timeout_ms(),
            http_checks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpCheckConfig {
    pub name: String,
    pub url: Url,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: Url,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl RetryConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("{0} port must be non-zero")]
    ZeroPort(&'static str),

    #[error("health.probe_timeout_ms must be greater than zero")]
    ZeroProbeTimeout,

    #[error("http check name must not be empty")]
    EmptyCheckName,

    #[error("duplicate health check name: {0}")]
    DuplicateCheckName(String),

    #[error("redis url must use the redis:// scheme, got {0}")]
    InvalidRedisScheme(String),

    #[error("retry.max_attempts must be at least 1")]
    ZeroRetryAttempts,

    #[error("metrics path must start with '/': {0}")]
    InvalidMetricsPath(String),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ZeroPort("server"));
        }
        self.server.addr()?;

        if self.health.probe_timeout_ms == 0 {
            return Err(ConfigError::ZeroProbeTimeout);
        }

        // Built-in probe names share the namespace with configured http checks.
        let mut names: HashSet<&str> = HashSet::new();
        if self.database.is_some() {
            names.insert("database");
        }
        if self.cache.enabled {
            names.insert("cache");
        }
        if self.redis.is_some() {
            names.insert("redis");
        }

        for check in &self.health.http_checks {
            if check.name.trim().is_empty() {
                return Err(ConfigError::EmptyCheckName);
            }
            if !names.insert(check.name.as_str()) {
                return Err(ConfigError::DuplicateCheckName(check.name.clone()));
            }
            validate_retry(check.retry.as_ref())?;
        }

        if let Some(redis) = &self.redis {
            if redis.url.scheme() != "redis" {
                return Err(ConfigError::InvalidRedisScheme(redis.url.scheme().to_string()));
            }
            validate_retry(redis.retry.as_ref())?;
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(ConfigError::ZeroPort("metrics"));
            }
            if !self.metrics.path.starts_with('/') {
                return Err(ConfigError::InvalidMetricsPath(self.metrics.path.clone()));
            }
        }

        Ok(())
    }
}

fn validate_retry(retry: Option<&RetryConfig>) -> Result<(), ConfigError> {
    match retry {
        Some(retry) if retry.max_attempts == 0 => Err(ConfigError::ZeroRetryAttempts),
        _ => Ok(()),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_acquire_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    1
}

fn default_backoff_base_ms() -> u64 {
    50
}

fn default_backoff_max_ms() -> u64 {
    500
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_log_filter() -> String {
    "core_api=info".to_string()
}
