pub mod builder;
pub mod handler;

pub use builder::{shutdown_signal, Server, ServerBuilder};
pub use handler::{BoxError, RequestHandler, API_PREFIX};

use crate::events::EventSink;
use crate::health::Aggregator;
use crate::middleware::{RequestLogging, RequestLoggingLayer};
use std::sync::Arc;
use tower::ServiceBuilder;

/// The full service stack: request logging around the router.
pub type App = RequestLogging<RequestHandler>;

pub fn build_app(aggregator: Aggregator, sink: Arc<dyn EventSink>) -> App {
    ServiceBuilder::new()
        .layer(RequestLoggingLayer::new(sink.clone()))
        .service(RequestHandler::new(aggregator, sink))
}
