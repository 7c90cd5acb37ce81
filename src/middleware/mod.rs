// src/middleware/mod.rs
//! Request middleware, composed as `tower` layers.
//!
//! Each layer receives the next service and returns a wrapping service, so
//! the order of a `ServiceBuilder` chain is the order the wrappers run in:
//!
//! ```ignore
//! ServiceBuilder::new()
//!     .layer(RequestLoggingLayer::new(sink.clone()))
//!     .layer(PerformanceLayer::new("health_check", sink))
//!     .service(handler);
//! ```

mod performance;
mod request_logging;

pub use performance::{Performance, PerformanceLayer};
pub use request_logging::{RequestLogging, RequestLoggingLayer};

use hyper::{Body, Request};
use std::net::SocketAddr;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request id, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Peer address of the connection a request arrived on.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub SocketAddr);

/// Set by an authentication layer in front of the request logger.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// First `X-Forwarded-For` hop, else the connection's peer address.
pub fn client_ip(req: &Request<Body>) -> Option<String> {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match forwarded {
        Some(ip) => Some(ip.to_string()),
        None => peer_ip(req),
    }
}

/// The connection's peer address, ignoring forwarding headers.
pub fn peer_ip(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<ClientAddr>()
        .map(|addr| addr.0.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut req = Request::get("/")
            .header("x-forwarded-for", " 198.51.100.4 ,10.0.0.2")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ClientAddr("127.0.0.1:4000".parse().unwrap()));

        assert_eq!(client_ip(&req).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn test_peer_ip_ignores_forwarded_header() {
        let mut req = Request::get("/")
            .header("x-forwarded-for", "198.51.100.4")
            .body(Body::empty())
            .unwrap();
        assert_eq!(peer_ip(&req), None);

        req.extensions_mut()
            .insert(ClientAddr("127.0.0.1:4000".parse().unwrap()));
        assert_eq!(peer_ip(&req).as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_client_ip_without_any_source() {
        let req = Request::get("/").body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), None);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
