//! End-to-end tests for the webhook endpoints.
//!
//! The router runs in-process via `tower::ServiceExt::oneshot`, with
//! recording stubs standing in for the answer service and the LINE reply API.

use answer_relay::answer::QueryRelay;
use answer_relay::dispatch::Dispatcher;
use answer_relay::error::{RelayError, Result};
use answer_relay::server::{router, AppState};
use answer_relay::signature::{sign, SIGNATURE_HEADER};
use answer_relay::traits::{AnswerService, ReplySender};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

const SECRET: &str = "test-channel-secret";

// ─── Stubs ──────────────────────────────────────────────────────────

/// Answer service returning a fixed answer, optionally failing on demand.
struct StubAnswers {
    answer: String,
    failing: AtomicBool,
    queries: Mutex<Vec<String>>,
}

impl StubAnswers {
    fn new(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            failing: AtomicBool::new(false),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerService for StubAnswers {
    fn name(&self) -> &str {
        "stub"
    }

    async fn query(&self, text: &str) -> Result<String> {
        self.queries.lock().unwrap().push(text.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::answer("quota exceeded"));
        }
        Ok(self.answer.clone())
    }
}

/// Reply sender that records every call.
#[derive(Default)]
struct RecordingSender {
    rejecting: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        if self.rejecting {
            return Err(RelayError::Reply {
                status: Some(400),
                message: "Invalid reply token".to_string(),
            });
        }
        Ok(())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn app(answers: &Arc<StubAnswers>, sender: &Arc<RecordingSender>) -> Router {
    let dispatcher = Dispatcher::new(QueryRelay::new(answers.clone()), sender.clone());
    router(AppState::new(
        SecretString::from(SECRET.to_string()),
        dispatcher,
    ))
}

fn signed_callback(body: &str) -> Request<Body> {
    let sig = sign(SECRET.as_bytes(), body.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/callback")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, sig)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn text_event(reply_token: &str, text: &str) -> String {
    serde_json::json!({
        "destination": "Ubot",
        "events": [{
            "type": "message",
            "mode": "active",
            "timestamp": 1625665242211i64,
            "source": {"type": "user", "userId": "U123"},
            "replyToken": reply_token,
            "webhookEventId": "01FZ74A0TDDPYRVKNK77XKC3ZR",
            "deliveryContext": {"isRedelivery": false},
            "message": {"type": "text", "id": "1", "text": text}
        }]
    })
    .to_string()
}

// ─── GET /health ────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_returns_ok() {
    let answers = StubAnswers::new("unused");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_health_ignores_downstream_state() {
    let answers = StubAnswers::new("unused");
    answers.failing.store(true, Ordering::SeqCst);
    let sender = Arc::new(RecordingSender {
        rejecting: true,
        ..Default::default()
    });
    let app = app(&answers, &sender);

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(answers.queries().is_empty());
}

// ─── POST /callback ─────────────────────────────────────────────────

#[tokio::test]
async fn test_text_message_is_answered_once() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let (status, body) = send(&app, signed_callback(&text_event("rtok-1", "What is T?"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(answers.queries(), vec!["What is T?"]);
    assert_eq!(
        sender.sent(),
        vec![("rtok-1".to_string(), "R".to_string())]
    );
}

#[tokio::test]
async fn test_answer_trailing_newlines_trimmed() {
    let answers = StubAnswers::new("Hello world.\n\n");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let (status, _) = send(&app, signed_callback(&text_event("rtok", "hi"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(sender.sent()[0].1, "Hello world.");
}

#[tokio::test]
async fn test_no_text_events_is_a_noop() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let body = serde_json::json!({
        "destination": "Ubot",
        "events": [
            {"type": "follow", "replyToken": "r1", "source": {"type": "user", "userId": "U1"}},
            {"type": "message", "replyToken": "r2", "message": {"type": "sticker", "id": "9", "packageId": "1", "stickerId": "2"}},
            {"type": "unsend", "unsend": {"messageId": "325708"}}
        ]
    })
    .to_string();

    for payload in [body, r#"{"destination":"Ubot","events":[]}"#.to_string()] {
        let (status, text) = send(&app, signed_callback(&payload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "OK");
    }

    assert!(answers.queries().is_empty());
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_bad_signature_rejected_before_dispatch() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let body = text_event("rtok", "hi");
    let forged = sign(b"some-other-secret", body.as_bytes());
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .header(SIGNATURE_HEADER, forged)
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(answers.queries().is_empty());
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let body = text_event("rtok", "hi");
    let sig = sign(SECRET.as_bytes(), body.as_bytes());
    let tampered = body.replace("hi", "ho");
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .header(SIGNATURE_HEADER, sig)
        .body(Body::from(tampered))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .body(Body::from(text_event("rtok", "hi")))
        .unwrap();

    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(answers.queries().is_empty());
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    for body in ["{\"events\": [", "[]", "{\"events\": [{\"type\": \"message\"}]}"] {
        let (status, _) = send(&app, signed_callback(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
    }

    assert!(answers.queries().is_empty());
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_answer_failure_returns_500_and_server_recovers() {
    let answers = StubAnswers::new("R");
    answers.failing.store(true, Ordering::SeqCst);
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let (status, _) = send(&app, signed_callback(&text_event("rtok-1", "first"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(sender.sent().is_empty());

    answers.failing.store(false, Ordering::SeqCst);
    let (status, body) = send(&app, signed_callback(&text_event("rtok-2", "second"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(
        sender.sent(),
        vec![("rtok-2".to_string(), "R".to_string())]
    );
}

#[tokio::test]
async fn test_rejected_reply_still_acknowledged() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender {
        rejecting: true,
        ..Default::default()
    });
    let app = app(&answers, &sender);

    let (status, body) = send(&app, signed_callback(&text_event("expired", "hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
    assert_eq!(sender.sent().len(), 1);
}

#[tokio::test]
async fn test_empty_text_is_forwarded() {
    let answers = StubAnswers::new("");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let (status, _) = send(&app, signed_callback(&text_event("rtok", ""))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(answers.queries(), vec![""]);
    assert_eq!(sender.sent(), vec![("rtok".to_string(), String::new())]);
}

#[tokio::test]
async fn test_get_on_callback_not_allowed() {
    let answers = StubAnswers::new("R");
    let sender = Arc::new(RecordingSender::default());
    let app = app(&answers, &sender);

    let req = Request::builder()
        .uri("/callback")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
