// src/middleware/performance.rs
use super::RequestId;
use crate::events::{duration_ms, EventSink, LogEvent, PerformanceEvent};
use futures::future::BoxFuture;
use hyper::{Body, Request, Response};
use std::fmt::Display;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Times one named handler and emits a [`PerformanceEvent`] per call.
/// Handler errors are recorded as a 500 and then passed through unchanged.
#[derive(Clone)]
pub struct PerformanceLayer {
    view: Arc<str>,
    sink: Arc<dyn EventSink>,
}

impl PerformanceLayer {
    pub fn new(view: &str, sink: Arc<dyn EventSink>) -> Self {
        Self {
            view: Arc::from(view),
            sink,
        }
    }
}

impl<S> Layer<S> for PerformanceLayer {
    type Service = Performance<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Performance {
            inner,
            view: self.view.clone(),
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Performance<S> {
    inner: S,
    view: Arc<str>,
    sink: Arc<dyn EventSink>,
}

impl<S> Service<Request<Body>> for Performance<S>
where
    S: Service<Request<Body>, Response = Response<Body>>,
    S::Future: Send + 'static,
    S::Error: Display + Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let view = self.view.clone();
        let sink = self.sink.clone();
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;

            let (status_code, error) = match &result {
                Ok(response) => (response.status().as_u16(), None),
                Err(e) => (500, Some(e.to_string())),
            };

            sink.emit(&LogEvent::Performance(PerformanceEvent {
                view: view.to_string(),
                duration_ms: duration_ms(start.elapsed()),
                status_code,
                request_id,
                error,
            }));

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, Severity};
    use crate::middleware::RequestLoggingLayer;
    use hyper::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    #[tokio::test]
    async fn test_records_status_and_request_id() {
        let sink = Arc::new(MemorySink::new());
        let service = ServiceBuilder::new()
            .layer(RequestLoggingLayer::new(sink.clone()))
            .layer(PerformanceLayer::new("health_check", sink.clone()))
            .service(service_fn(|_req: Request<Body>| async {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                Ok::<_, Infallible>(response)
            }));

        let req = Request::get("/health/").body(Body::empty()).unwrap();
        service.oneshot(req).await.unwrap();

        let perf = sink.performance();
        let requests = sink.requests();
        assert_eq!(perf.len(), 1);
        assert_eq!(perf[0].view, "health_check");
        assert_eq!(perf[0].status_code, 503);
        assert_eq!(perf[0].error, None);
        // Inner layers finish first.
        assert_eq!(perf[0].request_id, requests[0].request_id);
        assert!(matches!(sink.events()[0], LogEvent::Performance(_)));
    }

    #[tokio::test]
    async fn test_handler_error_is_recorded_and_propagated() {
        let sink = Arc::new(MemorySink::new());
        let service = PerformanceLayer::new("health_check", sink.clone()).layer(service_fn(
            |_req: Request<Body>| async { Err::<Response<Body>, _>("database exploded".to_string()) },
        ));

        let req = Request::get("/health/").body(Body::empty()).unwrap();
        let err = service.oneshot(req).await.unwrap_err();

        assert_eq!(err, "database exploded");
        let perf = sink.performance();
        assert_eq!(perf[0].status_code, 500);
        assert_eq!(perf[0].error.as_deref(), Some("database exploded"));
        assert_eq!(perf[0].request_id, "unknown");
        assert_eq!(sink.events()[0].severity(), Severity::Error);
    }
}
