// src/health/probes/postgres.rs
use crate::config::DatabaseConfig;
use crate::health::Probe;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Executes a trivial query against the primary database.
pub struct PostgresProbe {
    pool: PgPool,
}

impl PostgresProbe {
    /// The pool connects on first use, so startup does not depend on the
    /// database being reachable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy(&config.url)
            .context("Invalid database url")?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Probe for PostgresProbe {
    async fn check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
