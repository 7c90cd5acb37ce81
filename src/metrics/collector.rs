// src/metrics/collector.rs
use crate::events::{EventSink, LogEvent};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Request metrics
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub view_duration_seconds: HistogramVec,

    // Health metrics
    pub health_probe_status: IntGaugeVec,
    pub health_probe_duration_seconds: HistogramVec,
    pub health_runs_total: IntCounterVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let http_requests_total = IntCounterVec::new(
            Opts::new("core_http_requests_total", "Total number of HTTP requests"),
            &["method", "status_code"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "core_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        let view_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "core_view_duration_seconds",
                "Monitored view duration in seconds",
            ),
            &["view", "status_code"],
        )?;
        registry.register(Box::new(view_duration_seconds.clone()))?;

        let health_probe_status = IntGaugeVec::new(
            Opts::new(
                "core_health_probe_status",
                "Health probe status (1=healthy, 0=unhealthy)",
            ),
            &["probe"],
        )?;
        registry.register(Box::new(health_probe_status.clone()))?;

        let health_probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "core_health_probe_duration_seconds",
                "Health probe duration in seconds",
            ),
            &["probe"],
        )?;
        registry.register(Box::new(health_probe_duration_seconds.clone()))?;

        let health_runs_total = IntCounterVec::new(
            Opts::new("core_health_runs_total", "Total health aggregation runs"),
            &["status"],
        )?;
        registry.register(Box::new(health_runs_total.clone()))?;

        Ok(Self {
            http_requests_total,
            http_request_duration_seconds,
            view_duration_seconds,
            health_probe_status,
            health_probe_duration_seconds,
            health_runs_total,
        })
    }

    pub fn record_request(&self, method: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.http_requests_total
            .with_label_values(&[method, &status])
            .inc();

        self.http_request_duration_seconds
            .with_label_values(&[method])
            .observe(duration.as_secs_f64());
    }

    pub fn record_view(&self, view: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.view_duration_seconds
            .with_label_values(&[view, &status])
            .observe(duration.as_secs_f64());
    }

    pub fn record_probe(&self, probe: &str, healthy: bool, duration: Duration) {
        let value = if healthy { 1 } else { 0 };
        self.health_probe_status
            .with_label_values(&[probe])
            .set(value);

        self.health_probe_duration_seconds
            .with_label_values(&[probe])
            .observe(duration.as_secs_f64());
    }

    pub fn record_health_run(&self, healthy: bool) {
        let status = if healthy { "healthy" } else { "unhealthy" };
        self.health_runs_total.with_label_values(&[status]).inc();
    }
}

impl EventSink for MetricsCollector {
    fn emit(&self, event: &LogEvent) {
        match event {
            LogEvent::Request(request) => self.record_request(
                &request.method,
                request.status_code,
                Duration::from_secs_f64(request.duration_ms / 1000.0),
            ),
            LogEvent::Performance(perf) => self.record_view(
                &perf.view,
                perf.status_code,
                Duration::from_secs_f64(perf.duration_ms / 1000.0),
            ),
        }
    }
}
