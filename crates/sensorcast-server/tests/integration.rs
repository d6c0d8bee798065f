//! End-to-end tests against a real listener.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use sensorcast_server::metrics::detached_handle;
use sensorcast_server::{SensorcastServer, ServerConfig, ServerHandle};
use serde_json::{json, Value};
use tokio::time::timeout;

const STEP: Duration = Duration::from_secs(5);

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// Reads `data:` frames off an SSE response body.
struct EventReader {
    body: ByteStream,
    buf: String,
}

impl EventReader {
    async fn open(base: &str) -> Self {
        let resp = timeout(STEP, reqwest::get(format!("{base}/events")))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");
        Self {
            body: Box::pin(resp.bytes_stream()),
            buf: String::new(),
        }
    }

    /// Next event's payload, or `None` when the stream ends.
    async fn next_frame(&mut self) -> Option<Value> {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let event: String = self.buf.drain(..pos + 2).collect();
                let data: Vec<&str> = event
                    .lines()
                    .filter_map(|l| l.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect();
                return Some(serde_json::from_str(&data.join("\n")).unwrap());
            }
            let chunk = timeout(STEP, self.body.next()).await.unwrap()?.ok()?;
            self.buf.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }
}

async fn boot() -> (ServerHandle, String) {
    let server = SensorcastServer::new(ServerConfig::default(), detached_handle());
    let handle = server.start().await.unwrap();
    let base = format!("http://{}", handle.local_addr());
    (handle, base)
}

async fn post(client: &reqwest::Client, base: &str, body: &str) -> reqwest::Response {
    timeout(
        STEP,
        client
            .post(format!("{base}/sensor-data"))
            .header("content-type", "application/json")
            .body(body.to_owned())
            .send(),
    )
    .await
    .unwrap()
    .unwrap()
}

async fn health(base: &str) -> Value {
    timeout(STEP, async {
        reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json::<Value>()
            .await
            .unwrap()
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn explicit_false_survives_merge() {
    let (handle, base) = boot().await;
    let client = reqwest::Client::new();

    let _ = post(&client, &base, r#"{"pumpStatus":true}"#).await;
    let resp = post(&client, &base, r#"{"temperature":22.5,"pumpStatus":false}"#).await;
    assert_eq!(resp.status(), 200);

    let report = health(&base).await;
    assert_eq!(report["status"], "healthy");
    assert_eq!(report["lastData"]["pumpStatus"], false);
    assert_eq!(report["lastData"]["temperature"], 22.5);

    handle.shutdown().await;
}

#[tokio::test]
async fn two_subscribers_both_receive_broadcast() {
    let (handle, base) = boot().await;
    let client = reqwest::Client::new();

    let mut a = EventReader::open(&base).await;
    let mut b = EventReader::open(&base).await;
    assert_eq!(a.next_frame().await.unwrap()["fanStatus"], false);
    assert_eq!(b.next_frame().await.unwrap()["fanStatus"], false);

    let resp = post(&client, &base, r#"{"fanStatus":true}"#).await;
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["clientCount"], 2);

    assert_eq!(a.next_frame().await.unwrap()["fanStatus"], true);
    assert_eq!(b.next_frame().await.unwrap()["fanStatus"], true);

    handle.shutdown().await;
}

#[tokio::test]
async fn late_subscriber_sees_current_frame_first() {
    let (handle, base) = boot().await;
    let client = reqwest::Client::new();

    let _ = post(&client, &base, r#"{"tankStatus":"Full","waterLevel":87}"#).await;
    let mut reader = EventReader::open(&base).await;
    let first = reader.next_frame().await.unwrap();
    assert_eq!(first["tankStatus"], "Full");
    assert_eq!(first["waterLevel"], 87.0);

    handle.shutdown().await;
}

#[tokio::test]
async fn malformed_body_is_rejected_and_state_unchanged() {
    let (handle, base) = boot().await;
    let client = reqwest::Client::new();

    let _ = post(&client, &base, r#"{"humidity":61}"#).await;
    let before = health(&base).await["lastData"].clone();

    let resp = post(&client, &base, "definitely not json").await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid telemetry payload");

    assert_eq!(health(&base).await["lastData"], before);
    handle.shutdown().await;
}

#[tokio::test]
async fn unknown_route_returns_envelope() {
    let (handle, base) = boot().await;
    let resp = timeout(STEP, reqwest::get(format!("{base}/nope")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"success": false, "message": "Route not found"}));

    let resp = timeout(STEP, reqwest::get(format!("{base}/sensor-data")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
    handle.shutdown().await;
}

#[tokio::test]
async fn disconnect_decrements_connected_clients() {
    let (handle, base) = boot().await;
    let client = reqwest::Client::new();

    let mut keep = EventReader::open(&base).await;
    let mut leave = EventReader::open(&base).await;
    let _ = keep.next_frame().await.unwrap();
    let _ = leave.next_frame().await.unwrap();
    assert_eq!(health(&base).await["connectedClients"], 2);

    drop(leave);

    // The server notices the closed socket on its next write.
    let settled = timeout(STEP, async {
        loop {
            let _ = post(&client, &base, r#"{"light":1}"#).await;
            let _ = keep.next_frame().await.unwrap();
            if health(&base).await["connectedClients"] == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "closed subscriber was never removed");
    assert_eq!(handle.service().subscriber_count(), 1);

    let _ = post(&client, &base, r#"{"light":2}"#).await;
    assert_eq!(keep.next_frame().await.unwrap()["light"], 2.0);

    handle.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_open_streams() {
    let (handle, base) = boot().await;
    let mut reader = EventReader::open(&base).await;
    let _ = reader.next_frame().await.unwrap();

    let service = std::sync::Arc::clone(handle.service());
    timeout(STEP, handle.shutdown()).await.unwrap();

    assert!(reader.next_frame().await.is_none());
    assert_eq!(service.subscriber_count(), 0);
}
