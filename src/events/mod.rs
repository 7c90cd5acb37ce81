// src/events/mod.rs
//! Structured log events emitted by the middleware.
//!
//! Middleware never logs through a global; it hands each event to the
//! [`EventSink`] it was built with. [`TracingSink`] is the production sink.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Milliseconds rounded to two decimals.
pub fn duration_ms(duration: Duration) -> f64 {
    (duration.as_secs_f64() * 100_000.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn for_status(status_code: u16) -> Self {
        if status_code >= 500 {
            Severity::Error
        } else if status_code >= 400 {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

/// One completed HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEvent {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub duration_ms: f64,
    pub user: String,
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_params: Option<BTreeMap<String, Vec<String>>>,
}

/// Timing of one monitored handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceEvent {
    pub view: String,
    pub duration_ms: f64,
    pub status_code: u16,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEvent {
    Request(RequestEvent),
    Performance(PerformanceEvent),
}

impl LogEvent {
    pub fn severity(&self) -> Severity {
        match self {
            LogEvent::Request(e) => Severity::for_status(e.status_code),
            LogEvent::Performance(e) if e.error.is_some() => Severity::Error,
            LogEvent::Performance(e) => Severity::for_status(e.status_code),
        }
    }

    pub fn message(&self) -> &'static str {
        match (self, self.severity()) {
            (LogEvent::Request(_), Severity::Error) => "Request failed",
            (LogEvent::Request(_), Severity::Warning) => "Request had issues",
            (LogEvent::Request(_), Severity::Info) => "Request processed",
            (LogEvent::Performance(_), _) => "View performance",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LogEvent);
}

/// Writes events as structured `tracing` records at their severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! emit_request {
    ($level:expr, $msg:expr, $e:ident) => {
        tracing::event!(
            $level,
            request_id = %$e.request_id,
            method = %$e.method,
            path = %$e.path,
            status_code = $e.status_code,
            duration_ms = $e.duration_ms,
            user = %$e.user,
            ip = $e.ip.as_deref().unwrap_or("unknown"),
            query_params = ?$e.query_params,
            "{}",
            $msg
        )
    };
}

macro_rules! emit_performance {
    ($level:expr, $msg:expr, $e:ident) => {
        tracing::event!(
            $level,
            view = %$e.view,
            duration_ms = $e.duration_ms,
            status_code = $e.status_code,
            request_id = %$e.request_id,
            error = $e.error.as_deref(),
            "{}",
            $msg
        )
    };
}

impl EventSink for TracingSink {
    fn emit(&self, event: &LogEvent) {
        use tracing::Level;

        let msg = event.message();
        match (event, event.severity()) {
            (LogEvent::Request(e), Severity::Info) => emit_request!(Level::INFO, msg, e),
            (LogEvent::Request(e), Severity::Warning) => emit_request!(Level::WARN, msg, e),
            (LogEvent::Request(e), Severity::Error) => emit_request!(Level::ERROR, msg, e),
            (LogEvent::Performance(e), Severity::Info) => emit_performance!(Level::INFO, msg, e),
            (LogEvent::Performance(e), Severity::Warning) => emit_performance!(Level::WARN, msg, e),
            (LogEvent::Performance(e), Severity::Error) => emit_performance!(Level::ERROR, msg, e),
        }
    }
}

/// Forwards every event to each wrapped sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &LogEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Keeps emitted events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<LogEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RequestEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Request(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn performance(&self) -> Vec<PerformanceEvent> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LogEvent::Performance(p) => Some(p),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(status_code: u16) -> LogEvent {
        LogEvent::Request(RequestEvent {
            request_id: "req-1".to_string(),
            method: "GET".to_string(),
            path: "/api/v1/core/ping/".to_string(),
            status_code,
            duration_ms: 1.25,
            user: "anonymous".to_string(),
            ip: Some("10.0.0.1".to_string()),
            query_params: None,
        })
    }

    #[test]
    fn test_request_severity_follows_status() {
        assert_eq!(request(200).severity(), Severity::Info);
        assert_eq!(request(404).severity(), Severity::Warning);
        assert_eq!(request(503).severity(), Severity::Error);
        assert_eq!(request(503).message(), "Request failed");
        assert_eq!(request(404).message(), "Request had issues");
        assert_eq!(request(302).message(), "Request processed");
    }

    #[test]
    fn test_performance_error_is_always_error_level() {
        let event = LogEvent::Performance(PerformanceEvent {
            view: "health_check".to_string(),
            duration_ms: 0.5,
            status_code: 200,
            request_id: "unknown".to_string(),
            error: Some("boom".to_string()),
        });
        assert_eq!(event.severity(), Severity::Error);
        assert_eq!(event.message(), "View performance");
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let fanout = FanoutSink::new()
            .with(a.clone())
            .with(b.clone())
            .with(Arc::new(TracingSink));

        fanout.emit(&request(200));

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.requests()[0].status_code, 200);
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let value = serde_json::to_value(request(200)).unwrap();
        assert_eq!(value["kind"], "request");
        assert_eq!(value["status_code"], 200);
        assert!(value.get("query_params").is_none());
    }
}
