// src/health/report.rs
use crate::events::duration_ms;
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl From<bool> for HealthStatus {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }
}

/// Outcome of one probe execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    name: String,
    healthy: bool,
    error: Option<String>,
    duration: Duration,
}

impl ProbeResult {
    pub fn healthy(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            error: None,
            duration,
        }
    }

    /// An empty message is replaced so unhealthy results always carry detail.
    pub fn unhealthy(name: impl Into<String>, error: impl Into<String>, duration: Duration) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "probe failed".to_string()
        } else {
            error
        };

        Self {
            name: name.into(),
            healthy: false,
            error: Some(error),
            duration,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn status(&self) -> HealthStatus {
        self.healthy.into()
    }
}

impl Serialize for ProbeResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.error.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("ProbeResult", len)?;
        state.serialize_field("status", &self.status())?;
        if let Some(error) = &self.error {
            state.serialize_field("error", error)?;
        }
        state.serialize_field("duration_ms", &duration_ms(self.duration))?;
        state.end()
    }
}

/// Combined result of one aggregation run. The overall status is derived
/// from the results at construction and cannot drift from them.
#[derive(Debug, Clone)]
pub struct HealthReport {
    overall_healthy: bool,
    results: Vec<ProbeResult>,
    timestamp: DateTime<Utc>,
}

impl HealthReport {
    pub fn new(results: Vec<ProbeResult>, timestamp: DateTime<Utc>) -> Self {
        let overall_healthy = results.iter().all(ProbeResult::is_healthy);
        Self {
            overall_healthy,
            results,
            timestamp,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_healthy
    }

    pub fn status(&self) -> HealthStatus {
        self.overall_healthy.into()
    }

    /// Results in registration order.
    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.healthy)
    }
}

struct Checks<'a>(&'a [ProbeResult]);

impl Serialize for Checks<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for result in self.0 {
            map.serialize_entry(&result.name, result)?;
        }
        map.end()
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("HealthReport", 3)?;
        state.serialize_field("status", &self.status())?;
        state.serialize_field("checks", &Checks(&self.results))?;
        state.serialize_field("timestamp", &self.timestamp.to_rfc3339())?;
        state.end()
    }
}
