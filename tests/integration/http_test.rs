#![allow(clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;

use std::time::Duration;

use async_trait::async_trait;
use cabwatch::application::config::AppConfig;
use cabwatch::application::services::worker::WorkerStats;
use cabwatch::domain::ports::transport::{MessageTransport, OutgoingMessage, TransportError};
use cabwatch::domain::value_objects::comparison::ComparisonOperator;
use cabwatch::infrastructure::persistence::in_memory_store::InMemoryStore;
use cabwatch::presentation::cli::commands::serve::{build_pipeline, run_serve};
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;

struct SilentTransport;

#[async_trait]
impl MessageTransport for SilentTransport {
    async fn send(&self, _address: &str, _message: &OutgoingMessage) -> Result<(), TransportError> {
        Ok(())
    }
}

struct TestServer {
    addr: SocketAddr,
    store: Arc<InMemoryStore>,
    enclosure_id: i64,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<WorkerStats>>,
}

impl TestServer {
    async fn start() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let enclosure = store.add_enclosure("Rack A", "Room 1");
        store.add_rule(enclosure.id, ComparisonOperator::GreaterThan, 30.0);
        store.add_recipient("ops@example.com", true);

        let pipeline = build_pipeline(store.clone(), Arc::new(SilentTransport), &AppConfig::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown, signal) = oneshot::channel::<()>();
        let handle = tokio::spawn(run_serve(listener, pipeline, async move {
            let _ = signal.await;
        }));

        Self {
            addr,
            store,
            enclosure_id: enclosure.id,
            shutdown,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn live_subscribers(&self) -> i64 {
        let body: Value = reqwest::get(self.url("/health"))
            .await
            .expect("request")
            .json()
            .await
            .expect("json");
        body["live_subscribers"].as_i64().expect("count")
    }

    /// Poll `/health` until the live subscriber count reaches `expected`.
    async fn wait_for_subscribers(&self, expected: i64) {
        for _ in 0..100 {
            if self.live_subscribers().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("live subscriber count never reached {expected}");
    }

    async fn stop(self) -> WorkerStats {
        let _ = self.shutdown.send(());
        self.handle.await.expect("join").expect("serve")
    }
}

#[tokio::test]
async fn health_reports_version_and_subscribers() {
    let server = TestServer::start().await;

    let response = reqwest::get(server.url("/health")).await.expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["live_subscribers"], 0);

    server.stop().await;
}

#[tokio::test]
async fn accepted_sample_returns_created() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/api/samples"))
        .json(&json!({
            "enclosure_id": server.enclosure_id,
            "temperature": 31.5,
            "humidity": 40.0
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let body: Value = response.json().await.expect("json");
    assert_eq!(body["enclosure_id"], server.enclosure_id);
    assert_eq!(body["temperature"], 31.5);
    assert!(body["id"].as_i64().is_some());
    assert!(body["captured_at"].as_str().is_some());

    let store = server.store.clone();
    let stats = server.stop().await;
    assert_eq!(store.sample_count(), 1);
    assert_eq!(stats.alarms_raised, 1);
    assert_eq!(store.alarm_count(), 1);
}

#[tokio::test]
async fn unknown_enclosure_is_not_found() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(server.url("/api/samples"))
        .json(&json!({ "enclosure_id": 999, "temperature": 50.0, "humidity": 40.0 }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["error"], "not_found");

    let store = server.store.clone();
    server.stop().await;
    assert_eq!(store.sample_count(), 0);
    assert_eq!(store.alarm_count(), 0);
}

#[tokio::test]
async fn malformed_payloads_are_bad_requests() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let not_json = client
        .post(server.url("/api/samples"))
        .header("content-type", "application/json")
        .body("{temperature: hot")
        .send()
        .await
        .expect("request");
    assert_eq!(not_json.status(), reqwest::StatusCode::BAD_REQUEST);

    let missing_field = client
        .post(server.url("/api/samples"))
        .json(&json!({ "enclosure_id": server.enclosure_id, "temperature": 20.0 }))
        .send()
        .await
        .expect("request");
    assert_eq!(missing_field.status(), reqwest::StatusCode::BAD_REQUEST);

    let out_of_range = client
        .post(server.url("/api/samples"))
        .json(&json!({
            "enclosure_id": server.enclosure_id,
            "temperature": 20.0,
            "humidity": 140.0
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(out_of_range.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = out_of_range.json().await.expect("json");
    assert_eq!(body["error"], "bad_request");

    let store = server.store.clone();
    server.stop().await;
    assert_eq!(store.sample_count(), 0);
}

#[tokio::test]
async fn live_subscriber_receives_alarm_and_leaves_on_close() {
    let server = TestServer::start().await;

    let (mut socket, _) = connect_async(format!("ws://{}/ws/alarms", server.addr))
        .await
        .expect("websocket handshake");
    server.wait_for_subscribers(1).await;

    let response = reqwest::Client::new()
        .post(server.url("/api/samples"))
        .json(&json!({
            "enclosure_id": server.enclosure_id,
            "temperature": 31.5,
            "humidity": 40.0
        }))
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("alert within timeout")
        .expect("stream open")
        .expect("frame");
    let alert: Value = serde_json::from_str(frame.to_text().expect("text frame")).expect("json");
    assert_eq!(alert["enclosure"], "Rack A");
    assert_eq!(alert["enclosure_id"], server.enclosure_id);
    assert_eq!(alert["temperature"], 31.5);
    assert_eq!(alert["operator"], ">");
    assert_eq!(alert["threshold"], 30.0);
    assert!(alert["alarm_id"].as_i64().is_some());

    socket.close(None).await.expect("close");
    server.wait_for_subscribers(0).await;

    server.stop().await;
}
