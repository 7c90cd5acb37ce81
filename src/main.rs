// src/main.rs
use anyhow::Result;
use core_api::{
    cache::{Cache, MemoryCache},
    config::{self, Config},
    events::{EventSink, FanoutSink, TracingSink},
    health::{probes::build_registry, Aggregator},
    metrics::MetricsRegistry,
    server::{build_app, ServerBuilder},
};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = config::resolve_config(config_path.clone()).await?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))?
        .add_directive("hyper=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        "Loaded configuration from: {}",
        config_path.as_deref().unwrap_or(config::DEFAULT_CONFIG_PATH)
    );

    run(config).await
}

async fn run(config: Config) -> Result<()> {
    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    let memory_cache = MemoryCache::new();
    spawn_cache_purger(memory_cache.clone());
    let cache: Arc<dyn Cache> = Arc::new(memory_cache);

    // Probes are fixed once the registry is shared
    let registry = Arc::new(build_registry(&config, cache)?);
    let aggregator =
        Aggregator::new(registry, config.health.probe_timeout()).with_metrics(metrics.clone());

    let sink: Arc<dyn EventSink> = Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(metrics.clone()),
    );

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry, config.metrics.path.clone()).await?;
    }

    let addr = config.server.addr()?;
    info!("Starting core api on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(build_app(aggregator, sink))
        .serve()
        .await?;

    info!("Server stopped");
    Ok(())
}

fn spawn_cache_purger(cache: MemoryCache) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired cache entries", purged);
            }
        }
    });
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Ok::<_, Infallible>(plain(StatusCode::NOT_FOUND, "Not Found".into()));
                    }

                    let response = match registry.gather() {
                        Ok(metrics) => {
                            let mut response = plain(StatusCode::OK, Body::from(metrics));
                            response.headers_mut().insert(
                                hyper::header::CONTENT_TYPE,
                                hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
                            );
                            response
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            plain(StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable".into())
                        }
                    };
                    Ok(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)?.serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn plain(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}
