// src/health/aggregator.rs
use super::registry::{ProbeRegistry, RegisteredProbe};
use super::report::{HealthReport, ProbeResult};
use crate::metrics::MetricsCollector;
use chrono::Utc;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio::time::{timeout, Duration, Instant};
use tracing::{debug, info, warn};

pub const TIMEOUT_ERROR: &str = "timeout";

/// Runs every registered probe and merges the outcomes into one report.
#[derive(Clone)]
pub struct Aggregator {
    registry: Arc<ProbeRegistry>,
    default_timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Aggregator {
    pub fn new(registry: Arc<ProbeRegistry>, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    pub async fn run_default(&self) -> HealthReport {
        self.run(self.default_timeout).await
    }

    /// Each probe runs on its own task under its own timeout. A failing,
    /// panicking or stalled probe only affects its own result; the report
    /// is assembled once every probe has finished or timed out.
    pub async fn run(&self, timeout_per_probe: Duration) -> HealthReport {
        let started = Instant::now();

        let pending: Vec<_> = self
            .registry
            .probes()
            .iter()
            .map(|entry| spawn_probe(entry, timeout_per_probe))
            .collect();

        let results = futures::future::join_all(pending).await;

        let mut healthy_count = 0;
        let mut unhealthy_count = 0;

        for result in &results {
            if result.is_healthy() {
                healthy_count += 1;
                debug!(
                    probe = result.name(),
                    duration_ms = result.duration().as_millis() as u64,
                    "probe healthy"
                );
            } else {
                unhealthy_count += 1;
                warn!(
                    probe = result.name(),
                    error = result.error().unwrap_or_default(),
                    "probe unhealthy"
                );
            }

            if let Some(metrics) = &self.metrics {
                metrics.record_probe(result.name(), result.is_healthy(), result.duration());
            }
        }

        let report = HealthReport::new(results, Utc::now());

        if let Some(metrics) = &self.metrics {
            metrics.record_health_run(report.is_healthy());
        }

        if report.is_healthy() {
            info!(
                "Health check complete: {} healthy, {} unhealthy in {:?}",
                healthy_count,
                unhealthy_count,
                started.elapsed()
            );
        } else {
            warn!(
                "Health check complete: {} healthy, {} unhealthy in {:?}",
                healthy_count,
                unhealthy_count,
                started.elapsed()
            );
        }

        report
    }
}

fn spawn_probe(
    entry: &RegisteredProbe,
    timeout_per_probe: Duration,
) -> impl std::future::Future<Output = ProbeResult> {
    let name = entry.name.clone();
    let probe = entry.probe.clone();
    let start = Instant::now();
    let mut handle = tokio::spawn(async move { probe.check().await });

    async move {
        let outcome = timeout(timeout_per_probe, &mut handle).await;
        let duration = start.elapsed();

        match outcome {
            // A check that blocked its worker can finish before the deadline
            // is observed; the elapsed time still decides.
            Ok(_) if duration > timeout_per_probe => {
                ProbeResult::unhealthy(name, TIMEOUT_ERROR, duration)
            }
            Ok(Ok(Ok(()))) => ProbeResult::healthy(name, duration),
            Ok(Ok(Err(e))) => ProbeResult::unhealthy(name, e.to_string(), duration),
            Ok(Err(join_error)) => ProbeResult::unhealthy(name, describe_join_error(join_error), duration),
            Err(_) => {
                // Best effort: the probe only stops at its next await point.
                handle.abort();
                ProbeResult::unhealthy(name, TIMEOUT_ERROR, duration)
            }
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        format!("probe panicked: {}", panic_message(err.into_panic()))
    } else {
        "probe cancelled".to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
