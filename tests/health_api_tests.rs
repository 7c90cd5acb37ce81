// tests/health_api_tests.rs
use core_api::events::{EventSink, MemorySink};
use core_api::health::{probe_fn, Aggregator, ProbeRegistry};
use core_api::middleware::REQUEST_ID_HEADER;
use core_api::server::{build_app, ServerBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    sink: Arc<MemorySink>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(registry: ProbeRegistry) -> Self {
        let sink = Arc::new(MemorySink::new());
        let aggregator = Aggregator::new(Arc::new(registry), Duration::from_millis(200));
        let app = build_app(aggregator, sink.clone() as Arc<dyn EventSink>);

        let server = ServerBuilder::new("127.0.0.1:0".parse().unwrap())
            .with_handler(app)
            .bind()
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(server.run(async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            sink,
            shutdown: Some(tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_ping_round_trip_over_tcp() {
    let server = TestServer::start(ProbeRegistry::new()).await;

    let response = reqwest::get(server.url("/api/v1/core/ping/")).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let request_id = response.headers()[REQUEST_ID_HEADER]
        .to_str()
        .unwrap()
        .to_string();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"ping": "pong"}));

    let events = server.sink.requests();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].request_id, request_id);
    assert_eq!(events[0].ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(events[0].status_code, 200);
}

#[tokio::test]
async fn test_health_endpoint_reports_each_probe() {
    let mut registry = ProbeRegistry::new();
    registry.register("database", probe_fn(|| async { Ok(()) })).unwrap();
    registry.register("cache", probe_fn(|| async { Ok(()) })).unwrap();
    let server = TestServer::start(registry).await;

    let response = reqwest::get(server.url("/api/v1/core/health/")).await.unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["status"], "healthy");
    assert!(body["checks"]["cache"].get("error").is_none());

    let perf = server.sink.performance();
    assert_eq!(perf.len(), 1);
    assert_eq!(perf[0].status_code, 200);
    assert_eq!(perf[0].request_id, server.sink.requests()[0].request_id);
}

#[tokio::test]
async fn test_stalled_dependency_yields_503_within_timeout() {
    let mut registry = ProbeRegistry::new();
    registry.register("database", probe_fn(|| async { Ok(()) })).unwrap();
    registry
        .register(
            "broker",
            probe_fn(|| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }),
        )
        .unwrap();
    let server = TestServer::start(registry).await;

    let started = std::time::Instant::now();
    let response = reqwest::get(server.url("/api/v1/core/health")).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["broker"]["error"], "timeout");
    assert_eq!(body["checks"]["database"]["status"], "healthy");

    let requests = server.sink.requests();
    assert_eq!(requests[0].status_code, 503);
}

#[tokio::test]
async fn test_wrong_method_and_unknown_path() {
    let server = TestServer::start(ProbeRegistry::new()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/v1/core/ping/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);

    let response = client
        .get(server.url("/api/v1/core/fire-task/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

    let statuses: Vec<u16> = server.sink.requests().iter().map(|e| e.status_code).collect();
    assert_eq!(statuses, vec![405, 404]);
}
