// src/middleware/request_logging.rs
use super::{client_ip, AuthenticatedUser, RequestId, REQUEST_ID_HEADER};
use crate::events::{duration_ms, EventSink, LogEvent, RequestEvent};
use futures::future::BoxFuture;
use hyper::header::HeaderValue;
use hyper::{Body, Request, Response, StatusCode};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Tags each request with an id and emits one [`RequestEvent`] per
/// completed request.
#[derive(Clone)]
pub struct RequestLoggingLayer {
    sink: Arc<dyn EventSink>,
}

impl RequestLoggingLayer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLogging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogging {
            inner,
            sink: self.sink.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RequestLogging<S> {
    inner: S,
    sink: Arc<dyn EventSink>,
}

impl<S> Service<Request<Body>> for RequestLogging<S>
where
    S: Service<Request<Body>, Response = Response<Body>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let request_id = RequestId::new();
        req.extensions_mut().insert(request_id.clone());

        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let ip = client_ip(&req);
        let query_params = req.uri().query().and_then(parse_query);
        let user = req
            .extensions()
            .get::<AuthenticatedUser>()
            .map(|u| u.0.clone())
            .unwrap_or_else(|| "anonymous".to_string());

        let sink = self.sink.clone();
        let start = Instant::now();
        let future = self.inner.call(req);

        Box::pin(async move {
            let result = future.await;

            let status_code = match &result {
                Ok(response) => response.status(),
                Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };

            sink.emit(&LogEvent::Request(RequestEvent {
                request_id: request_id.as_str().to_string(),
                method,
                path,
                status_code: status_code.as_u16(),
                duration_ms: duration_ms(start.elapsed()),
                user,
                ip,
                query_params,
            }));

            result.map(|mut response| {
                if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                response
            })
        })
    }
}

/// Repeated keys keep every value, in order.
fn parse_query(query: &str) -> Option<BTreeMap<String, Vec<String>>> {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    if params.is_empty() {
        None
    } else {
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, Severity};
    use crate::middleware::ClientAddr;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    async fn respond_with(req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let status = match req.uri().path() {
            "/missing" => StatusCode::NOT_FOUND,
            "/broken" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::OK,
        };
        let mut response = Response::new(Body::empty());
        *response.status_mut() = status;
        Ok(response)
    }

    #[tokio::test]
    async fn test_tags_response_and_emits_event() {
        let sink = Arc::new(MemorySink::new());
        let service = ServiceBuilder::new()
            .layer(RequestLoggingLayer::new(sink.clone()))
            .service(service_fn(respond_with));

        let peer: SocketAddr = "192.168.1.20:50123".parse().unwrap();
        let mut req = Request::get("/api/v1/core/ping/").body(Body::empty()).unwrap();
        req.extensions_mut().insert(ClientAddr(peer));

        let response = service.oneshot(req).await.unwrap();

        let header = response.headers().get(REQUEST_ID_HEADER).unwrap();
        let events = sink.requests();
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(header.to_str().unwrap(), event.request_id);
        assert_eq!(event.method, "GET");
        assert_eq!(event.path, "/api/v1/core/ping/");
        assert_eq!(event.status_code, 200);
        assert_eq!(event.user, "anonymous");
        assert_eq!(event.ip.as_deref(), Some("192.168.1.20"));
        assert_eq!(event.query_params, None);
        assert!(event.duration_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_forwarded_for_and_query_params() {
        let sink = Arc::new(MemorySink::new());
        let service = RequestLoggingLayer::new(sink.clone()).layer(service_fn(respond_with));

        let req = Request::get("/missing?tag=a&tag=b&page=2")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        service.oneshot(req_with_user(req, "alice")).await.unwrap();

        let events = sink.requests();
        let event = &events[0];
        assert_eq!(event.ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(event.user, "alice");
        assert_eq!(event.status_code, 404);

        let params = event.query_params.as_ref().unwrap();
        assert_eq!(params["tag"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(params["page"], vec!["2".to_string()]);
    }

    #[tokio::test]
    async fn test_server_error_is_error_severity() {
        let sink = Arc::new(MemorySink::new());
        let service = RequestLoggingLayer::new(sink.clone()).layer(service_fn(respond_with));

        let req = Request::get("/broken").body(Body::empty()).unwrap();
        service.oneshot(req).await.unwrap();

        let events = sink.events();
        assert_eq!(events[0].severity(), Severity::Error);
        assert_eq!(events[0].message(), "Request failed");
    }

    fn req_with_user(mut req: Request<Body>, user: &str) -> Request<Body> {
        req.extensions_mut().insert(AuthenticatedUser(user.to_string()));
        req
    }
}
