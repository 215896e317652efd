use axum::{
    body::{to_bytes, Body, BodyDataStream},
    http::{header, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use relay_core::Broadcaster;
use relay_web::{create_router, session::CONFIRMATION, state::AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

fn app_with_shutdown() -> (Router, Arc<Broadcaster>, watch::Sender<bool>) {
    let broadcaster = Arc::new(Broadcaster::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = AppState::new(broadcaster.clone(), Duration::from_secs(3600), shutdown_rx);
    (create_router(state), broadcaster, shutdown_tx)
}

fn app() -> (Router, Arc<Broadcaster>) {
    let (router, broadcaster, _) = app_with_shutdown();
    (router, broadcaster)
}

async fn post_webhook(app: &Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn open_stream(app: &Router) -> SseReader {
    let response = app
        .clone()
        .oneshot(Request::get("/api/stream").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    SseReader {
        body: response.into_body().into_data_stream(),
        buffer: String::new(),
    }
}

/// Reads `data:` payloads off an SSE body.
struct SseReader {
    body: BodyDataStream,
    buffer: String,
}

impl SseReader {
    async fn next_data(&mut self) -> String {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let block: String = self.buffer.drain(..end + 2).collect();
                let data: Vec<&str> = block
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|d| d.strip_prefix(' ').unwrap_or(d))
                    .collect();
                if !data.is_empty() {
                    return data.join("\n");
                }
                continue;
            }
            let chunk = tokio::time::timeout(Duration::from_secs(2), self.body.next())
                .await
                .expect("frame within timeout")
                .expect("stream still open")
                .unwrap();
            self.buffer.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    }

    async fn next_json(&mut self) -> Value {
        serde_json::from_str(&self.next_data().await).unwrap()
    }
}

#[tokio::test]
async fn test_latest_on_fresh_process() {
    let (app, _) = app();
    let latest = get_json(&app, "/api/latest").await;
    assert_eq!(
        latest,
        json!({
            "success": true,
            "isProcessing": false,
            "lastMessageId": null,
            "listenerCount": 0,
            "answer": null,
        })
    );
}

#[tokio::test]
async fn test_answer_processing_answer_scenario() {
    let (app, _) = app();

    let (status, ack) = post_webhook(&app, r#"{"answer":"B=2","model":"gpt"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);
    assert_eq!(ack["message"], "Answer received and broadcasted");
    let latest = get_json(&app, "/api/latest").await;
    assert_eq!(latest["isProcessing"], false);
    assert_eq!(latest["answer"]["kind"], "answer");
    assert_eq!(latest["answer"]["answer"], "B=2");
    assert_eq!(latest["answer"]["model"], "gpt");
    assert_eq!(latest["lastMessageId"], latest["answer"]["messageId"]);

    let (_, ack) = post_webhook(&app, r#"{"kind":"processing"}"#).await;
    assert_eq!(ack["message"], "Processing status broadcasted");
    let after_processing = get_json(&app, "/api/latest").await;
    assert_eq!(after_processing["isProcessing"], true);
    assert_eq!(after_processing["answer"], latest["answer"]);
    assert_ne!(after_processing["lastMessageId"], latest["lastMessageId"]);

    post_webhook(&app, r#"{"answer":"C=3"}"#).await;
    let latest = get_json(&app, "/api/latest").await;
    assert_eq!(latest["isProcessing"], false);
    assert_eq!(latest["answer"]["answer"], "C=3");
}

#[tokio::test]
async fn test_missing_answer_is_rejected_without_emit() {
    let (app, broadcaster) = app();
    post_webhook(&app, r#"{"answer":"A=1"}"#).await;
    let before = broadcaster.snapshot();

    let (status, ack) = post_webhook(&app, r#"{"model":"gpt"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ack["success"], false);
    assert_eq!(ack["error"], "Missing required field: answer");
    assert_eq!(broadcaster.snapshot(), before);
}

#[tokio::test]
async fn test_malformed_body_is_internal_error() {
    let (app, broadcaster) = app();
    let (status, ack) = post_webhook(&app, "{not json").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(ack, json!({ "success": false, "error": "Internal server error" }));
    assert_eq!(broadcaster.snapshot().last_message_id, None);
}

#[tokio::test]
async fn test_stream_sends_confirmation_then_initial_state() {
    let (app, _) = app();
    post_webhook(&app, r#"{"answer":"B=2"}"#).await;

    let mut stream = open_stream(&app).await;
    assert_eq!(stream.next_data().await, CONFIRMATION);
    let answer = stream.next_json().await;
    assert_eq!(answer["kind"], "answer");
    assert_eq!(answer["answer"], "B=2");
}

#[tokio::test]
async fn test_two_consumers_receive_same_event() {
    let (app, broadcaster) = app();
    let mut first = open_stream(&app).await;
    let mut second = open_stream(&app).await;
    assert_eq!(first.next_data().await, CONFIRMATION);
    assert_eq!(second.next_data().await, CONFIRMATION);
    assert_eq!(get_json(&app, "/api/latest").await["listenerCount"], 2);

    post_webhook(&app, r#"{"answer":"D=4"}"#).await;
    let a = first.next_json().await;
    let b = second.next_json().await;
    assert_eq!(a["answer"], "D=4");
    assert_eq!(a["messageId"], b["messageId"]);

    drop(first);
    assert_eq!(broadcaster.listener_count(), 1);

    post_webhook(&app, r#"{"kind":"processing"}"#).await;
    let processing = second.next_json().await;
    assert_eq!(processing["kind"], "processing");
    assert_eq!(
        processing["messageId"],
        json!(broadcaster.snapshot().last_message_id)
    );
}

#[tokio::test]
async fn test_health_reports_listeners() {
    let (app, _) = app();
    let _stream = open_stream(&app).await;
    let health = get_json(&app, "/health").await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["listenerCount"], 1);
}

#[tokio::test]
async fn test_shutdown_ends_stream_and_deregisters() {
    let (app, broadcaster, shutdown) = app_with_shutdown();
    let mut stream = open_stream(&app).await;
    assert_eq!(stream.next_data().await, CONFIRMATION);
    assert_eq!(broadcaster.listener_count(), 1);

    shutdown.send(true).unwrap();

    let end = tokio::time::timeout(Duration::from_secs(2), stream.body.next())
        .await
        .expect("stream ends within timeout");
    assert!(end.is_none());
    assert_eq!(broadcaster.listener_count(), 0);
}
