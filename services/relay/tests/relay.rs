//! End-to-end tests for the relay
//!
//! A loopback `UdpSocket` plays the producer. The HTTP side is driven either
//! in-process through `tower::ServiceExt::oneshot` or over a real listener
//! with `reqwest` when concurrency matters.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::{TcpListener, UdpSocket};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use udp_relay::handlers::data::{AGE_HEADER, SEQUENCE_HEADER};
use udp_relay::metrics::RelayMetrics;
use udp_relay::perturb::Jitter;
use udp_relay::{create_router, AppState, IngestConfig, IngestLoop, IngestStats, SnapshotStore};

struct Relay {
    producer: UdpSocket,
    relay_addr: SocketAddr,
    store: Arc<SnapshotStore>,
    metrics: Arc<RelayMetrics>,
    shutdown: CancellationToken,
    ingest: tokio::task::JoinHandle<Result<IngestStats, udp_relay::error::RelayError>>,
}

impl Relay {
    async fn start() -> Self {
        let producer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let relay_addr = socket.local_addr().unwrap();
        let store = Arc::new(SnapshotStore::new());
        let metrics = Arc::new(RelayMetrics::new());
        let shutdown = CancellationToken::new();

        let ingest = IngestLoop::new(
            socket,
            producer.local_addr().unwrap(),
            Arc::clone(&store),
            Arc::clone(&metrics),
            IngestConfig {
                buffer_size: 4096,
                recv_timeout: Duration::from_secs(1),
            },
        );
        let ingest = tokio::spawn(ingest.run(shutdown.clone()));

        let relay = Self {
            producer,
            relay_addr,
            store,
            metrics,
            shutdown,
            ingest,
        };
        relay.expect_register().await;
        relay
    }

    fn state(&self) -> AppState {
        AppState::new(Arc::clone(&self.store), Arc::clone(&self.metrics))
    }

    async fn expect_register(&self) {
        let mut buf = [0u8; 64];
        let (n, from) = tokio::time::timeout(Duration::from_secs(5), self.producer.recv_from(&mut buf))
            .await
            .expect("no registration")
            .unwrap();
        assert_eq!(&buf[..n], b"register");
        assert_eq!(from, self.relay_addr);
    }

    async fn send(&self, payload: &[u8]) {
        self.producer.send_to(payload, self.relay_addr).await.unwrap();
    }

    async fn wait_for_sequence(&self, sequence: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.store.get().sequence < sequence {
            assert!(Instant::now() < deadline, "snapshot never reached {sequence}");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn stop(self) -> IngestStats {
        self.shutdown.cancel();
        self.ingest.await.unwrap().unwrap()
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_placeholder_served_before_first_datagram() {
    let relay = Relay::start().await;
    let app = create_router(relay.state());

    let (status, headers, body) = get(app, "/data").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[SEQUENCE_HEADER], "0");
    assert!(headers.get(AGE_HEADER).is_none());
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, json!({ "status": "Waiting for data..." }));

    relay.stop().await;
}

#[tokio::test]
async fn test_end_to_end_payload_with_jitter() {
    let relay = Relay::start().await;
    let app = create_router(relay.state().with_transform(Arc::new(Jitter::seeded(1.0, 11))));

    relay.send(br#"{"temp": 21.5, "ok": true}"#).await;
    relay.wait_for_sequence(1).await;

    let (status, headers, body) = get(app, "/data").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[SEQUENCE_HEADER], "1");
    assert!(headers.get(AGE_HEADER).is_some());

    let value: Value = serde_json::from_slice(&body).unwrap();
    let object = value.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(value["ok"], json!(true));
    let temp = value["temp"].as_f64().unwrap();
    assert!((temp - 21.5).abs() <= 1.0, "temp out of bound: {temp}");

    // The stored value itself is never perturbed.
    assert_eq!(relay.store.get().value, json!({ "temp": 21.5, "ok": true }));
    relay.stop().await;
}

#[tokio::test]
async fn test_end_to_end_payload_without_transform_is_exact() {
    let relay = Relay::start().await;
    let app = create_router(relay.state());

    relay.send(b"{\"temp\": 21.5, \"ok\": true}\n").await;
    relay.wait_for_sequence(1).await;

    let (_, _, body) = get(app, "/data").await;
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value, json!({ "temp": 21.5, "ok": true }));
    relay.stop().await;
}

#[tokio::test]
async fn test_malformed_then_valid_datagram() {
    let relay = Relay::start().await;
    relay.send(br#"{"first": 1}"#).await;
    relay.wait_for_sequence(1).await;

    relay.send(b"not json at all").await;
    relay.send(&[0xc3, 0x28]).await;
    relay.send(br#"{"second": 2}"#).await;
    relay.wait_for_sequence(2).await;

    let app = create_router(relay.state());
    let (_, headers, body) = get(app, "/data").await;
    assert_eq!(headers[SEQUENCE_HEADER], "2");
    assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({ "second": 2 }));

    let stats = relay.stop().await;
    assert_eq!(stats.received, 4);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.dropped, 2);
}

#[tokio::test]
async fn test_unknown_path_is_not_found_and_leaves_store_alone() {
    let relay = Relay::start().await;
    relay.send(br#"{"kept": true}"#).await;
    relay.wait_for_sequence(1).await;
    let before = relay.store.get();

    let app = create_router(relay.state());
    let (status, headers, body) = get(app, "/unknown-path").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
    assert_eq!(body, b"404 Not Found");
    assert_eq!(relay.store.get(), before);
    assert_eq!(relay.metrics.snapshot().polls_served, 0);
    relay.stop().await;
}

#[tokio::test]
async fn test_builtin_page_served_as_html() {
    let store = Arc::new(SnapshotStore::new());
    let app = create_router(AppState::new(store, Arc::new(RelayMetrics::new())));

    let (status, headers, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(String::from_utf8(body).unwrap().contains("fetch(\"/data\""));
}

#[tokio::test]
async fn test_missing_page_file_is_server_error() {
    let store = Arc::new(SnapshotStore::new());
    let state = AppState::new(store, Arc::new(RelayMetrics::new()))
        .with_page_path("/nonexistent/relay/viewer.html".into());
    let app = create_router(state);

    let (status, _, body) = get(app, "/").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8(body).unwrap().starts_with("Error loading page"));
}

#[tokio::test]
async fn test_healthz_reports_freshness_and_counters() {
    let relay = Relay::start().await;
    let app = create_router(relay.state());

    let (_, _, body) = get(app.clone(), "/healthz").await;
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "waiting");
    assert_eq!(health["sequence"], 0);
    assert!(health["last_update"].is_null());

    relay.send(b"{oops").await;
    relay.send(br#"{"a": 1}"#).await;
    relay.wait_for_sequence(1).await;
    get(app.clone(), "/data").await;

    let (_, _, body) = get(app, "/healthz").await;
    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["sequence"], 1);
    assert!(health["age_ms"].as_i64().unwrap() >= 0);
    assert_eq!(health["datagrams_received"], 2);
    assert_eq!(health["datagrams_accepted"], 1);
    assert_eq!(health["datagrams_dropped"], 1);
    assert!(health["registrations_sent"].as_u64().unwrap() >= 1);
    assert_eq!(health["polls_served"], 1);
    relay.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_polls_during_updates() {
    let relay = Relay::start().await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = listener.local_addr().unwrap();
    let app = create_router(relay.state());
    let server_stop = CancellationToken::new();
    let server = tokio::spawn({
        let stop = server_stop.clone().cancelled_owned();
        async move { axum::serve(listener, app).with_graceful_shutdown(stop).await }
    });

    let producer = Arc::new(relay.producer);
    let relay_addr = relay.relay_addr;
    let feeding = CancellationToken::new();
    let feeder = tokio::spawn({
        let producer = Arc::clone(&producer);
        let feeding = feeding.clone();
        async move {
            for i in 1..=300u64 {
                let payload = json!({ "i": i, "copy": i, "pad": "x".repeat(512) }).to_string();
                producer.send_to(payload.as_bytes(), relay_addr).await.unwrap();
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            feeding.cancel();
        }
    });

    // Polling starts only once updates are flowing.
    let deadline = Instant::now() + Duration::from_secs(5);
    while relay.store.get().sequence < 1 {
        assert!(Instant::now() < deadline, "feeder never delivered");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let client = reqwest::Client::new();
    let url = format!("http://{http_addr}/data");
    let pollers: Vec<_> = (0..50)
        .map(|_| {
            let client = client.clone();
            let url = url.clone();
            let feeding = feeding.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                loop {
                    let done = feeding.is_cancelled();
                    let response = client.get(&url).send().await.unwrap();
                    assert_eq!(response.status(), reqwest::StatusCode::OK);
                    let value = response.json::<Value>().await.unwrap();

                    assert_eq!(value["i"], value["copy"], "torn snapshot: {value}");
                    assert_eq!(value["pad"].as_str().unwrap().len(), 512);
                    let i = value["i"].as_u64().unwrap();
                    assert!((1..=300).contains(&i));
                    seen.push(i);
                    if done {
                        break;
                    }
                }
                seen
            })
        })
        .collect();

    let mut distinct = std::collections::BTreeSet::new();
    for poller in pollers {
        let seen = poller.await.unwrap();
        assert!(!seen.is_empty());
        // Consecutive polls from one client never go back in time.
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "poller saw older snapshot");
        distinct.extend(seen);
    }
    assert!(distinct.len() > 1, "polls never overlapped updates: {distinct:?}");

    feeder.await.unwrap();
    server_stop.cancel();
    server.await.unwrap().unwrap();
    relay.shutdown.cancel();
    relay.ingest.await.unwrap().unwrap();
}
