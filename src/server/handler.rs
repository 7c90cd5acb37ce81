// src/server/handler.rs
use crate::events::EventSink;
use crate::health::Aggregator;
use crate::middleware::{peer_ip, PerformanceLayer};
use futures::future::BoxFuture;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneService;
use tower::{service_fn, Service, ServiceBuilder, ServiceExt};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Route = BoxCloneService<Request<Body>, Response<Body>, BoxError>;

pub const API_PREFIX: &str = "/api/v1/core";

/// Dispatches requests to the core routes. Route errors become a 500 here,
/// so the router itself never fails.
#[derive(Clone)]
pub struct RequestHandler {
    ping: Route,
    health: Route,
}

impl RequestHandler {
    pub fn new(aggregator: Aggregator, sink: Arc<dyn EventSink>) -> Self {
        let ping_route = BoxCloneService::new(service_fn(ping));

        let health_route = ServiceBuilder::new()
            .layer(PerformanceLayer::new("health_check", sink))
            .service(service_fn(move |_req: Request<Body>| {
                health_check(aggregator.clone())
            }));

        Self {
            ping: ping_route,
            health: BoxCloneService::new(health_route),
        }
    }

    fn route(&self, path: &str) -> Option<&Route> {
        let path = path.strip_prefix(API_PREFIX)?;
        match path.trim_end_matches('/') {
            "/ping" => Some(&self.ping),
            "/health" => Some(&self.health),
            _ => None,
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let route = match self.route(req.uri().path()) {
            Some(route) => route.clone(),
            None => {
                return Box::pin(async { Ok(detail_response(StatusCode::NOT_FOUND, "Not found.")) })
            }
        };

        if req.method() != Method::GET {
            let detail = format!("Method \"{}\" not allowed.", req.method());
            return Box::pin(async move {
                let mut response = detail_response(StatusCode::METHOD_NOT_ALLOWED, &detail);
                response
                    .headers_mut()
                    .insert(hyper::header::ALLOW, HeaderValue::from_static("GET"));
                Ok(response)
            });
        }

        Box::pin(async move {
            match route.oneshot(req).await {
                Ok(response) => Ok(response),
                Err(e) => {
                    tracing::error!(%e, "handler error");
                    Ok(detail_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "A server error occurred.",
                    ))
                }
            }
        })
    }
}

async fn ping(req: Request<Body>) -> Result<Response<Body>, BoxError> {
    tracing::info!(
        "Ping request received from {}",
        peer_ip(&req).unwrap_or_else(|| "unknown".to_string())
    );
    json_response(StatusCode::OK, &serde_json::json!({ "ping": "pong" }))
}

async fn health_check(aggregator: Aggregator) -> Result<Response<Body>, BoxError> {
    let report = aggregator.run_default().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &report)
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, BoxError> {
    let bytes = serde_json::to_vec(body)?;
    Ok(with_json(status, Body::from(bytes)))
}

fn detail_response(status: StatusCode, detail: &str) -> Response<Body> {
    let body = serde_json::json!({ "detail": detail }).to_string();
    with_json(status, Body::from(body))
}

fn with_json(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
