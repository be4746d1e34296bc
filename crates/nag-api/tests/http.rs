#![cfg(feature = "http")]

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use nag_api::{HttpApi, NotifierAdapter};
use nag_core::{
    Deliver, DeliverRef, DeliveryError, DeliveryFactory, ExecContext, FakeClock, Notifier,
    TaskQueue,
};
use nag_model::Payload;
use serde_json::Value;
use tower::ServiceExt;

struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl Deliver for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    async fn deliver(&self, _: &Payload, _: &ExecContext) -> Result<(), DeliveryError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingFactory(Arc<AtomicUsize>);

impl DeliveryFactory for CountingFactory {
    fn build(&self, _: &Payload) -> Result<DeliverRef, DeliveryError> {
        Ok(Arc::new(Counting(self.0.clone())))
    }
}

struct Fixture {
    router: Router,
    delivered: Arc<AtomicUsize>,
    clock: FakeClock,
    notifier: Notifier,
}

fn fixture() -> Fixture {
    let delivered = Arc::new(AtomicUsize::new(0));
    let notifier = Notifier::new(TaskQueue::new(), Arc::new(CountingFactory(delivered.clone())));
    let clock = FakeClock::default();
    let adapter = NotifierAdapter::with_clock(notifier.clone(), Arc::new(clock.clone()));
    Fixture {
        router: HttpApi::new(Arc::new(adapter)).router(),
        delivered,
        clock,
        notifier,
    }
}

async fn call(router: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn wait_for(delivered: &AtomicUsize, n: usize) {
    for _ in 0..100 {
        if delivered.load(Ordering::SeqCst) >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {n} deliveries, saw {}", delivered.load(Ordering::SeqCst));
}

#[tokio::test]
async fn plain_text_notify_is_delivered() {
    let f = fixture();
    let (status, body) = call(&f.router, "POST", "/api/v1/do/notify", "Dryer finished #home").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "notified");
    assert!(!body["uniqid"].as_str().unwrap().is_empty());
    assert!(body["rate_limited_until"].is_null());
    wait_for(&f.delivered, 1).await;
}

#[tokio::test]
async fn rate_limited_notify_reports_window_end() {
    let f = fixture();
    let payload = r#"{"message":"door","uniqid":"door","once_per":10}"#;

    let (_, first) = call(&f.router, "POST", "/api/v1/do/notify", payload).await;
    assert!(first["rate_limited_until"].is_null());

    let (status, second) = call(&f.router, "POST", "/api/v1/do/notify", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["uniqid"], "door");
    assert!(second["rate_limited_until"].is_string());
}

#[tokio::test]
async fn recurring_notify_registers_and_ack_removes() {
    let f = fixture();
    let (status, body) = call(
        &f.router,
        "POST",
        "/api/v1/do/notify",
        r#"{"message":"pills","uniqid":"pills","times":3,"frequency":60,"once_per":120}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "registered");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    assert!(f.notifier.is_registered("pills"));

    let (_, status_body) = call(&f.router, "GET", "/api/v1/status", "").await;
    assert_eq!(status_body["nags"], 1);

    let (_, ack) = call(&f.router, "POST", "/api/v1/do/ack", r#"{"uniqid":"pills"}"#).await;
    assert_eq!(ack["kind"], "acknowledged");
    assert_eq!(ack["removed"], true);
    assert!(!f.notifier.is_registered("pills"));

    let (_, again) = call(&f.router, "POST", "/api/v1/do/ack", "pills").await;
    assert_eq!(again["removed"], false);
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let f = fixture();

    let (status, body) = call(&f.router, "POST", "/api/v1/do/explode", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("explode"));

    let (status, _) = call(&f.router, "POST", "/api/v1/do/notify", r#"{"message":"x","times":2}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&f.router, "POST", "/api/v1/do/notify", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for body in [
        r#"{"message":"m","for":1e12,"frequency":1}"#,
        r#"{"message":"m","once_per":1e12}"#,
    ] {
        let (status, _) = call(&f.router, "POST", "/api/v1/do/notify", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }

    let (status, _) = call(&f.router, "POST", "/api/v1/do/ack", "  ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&f.router, "POST", "/api/v1/do/step", "").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn suspended_queue_resumes_after_enqueue() {
    let f = fixture();

    let (_, body) = call(&f.router, "POST", "/api/v1/do/suspend", "").await;
    assert_eq!(body["status"], "suspended");

    call(&f.router, "POST", "/api/v1/do/notify", "first").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.delivered.load(Ordering::SeqCst), 0);

    let (_, body) = call(
        &f.router,
        "POST",
        "/api/v1/do/notify",
        r#"{"message":"second","then":"resume"}"#,
    )
    .await;
    assert!(body["warnings"].as_array().unwrap().is_empty());
    wait_for(&f.delivered, 2).await;
}

#[tokio::test]
async fn mute_toggles() {
    let f = fixture();
    let (_, body) = call(&f.router, "POST", "/api/v1/do/mute", "").await;
    assert_eq!(body, serde_json::json!({"kind": "mute_status", "muted": true}));
    assert!(f.notifier.is_muted());

    call(&f.router, "POST", "/api/v1/do/unmute", "").await;
    assert!(!f.notifier.is_muted());
}

#[tokio::test]
async fn query_messages_is_debounced_but_messages_endpoint_is_not() {
    let f = fixture();

    let (_, first) = call(&f.router, "POST", "/api/v1/do/query_messages", "").await;
    assert_eq!(first["kind"], "messages");
    assert_eq!(first["why"], "request-received");
    assert_eq!(first["messages"]["queue_status"], "idle");

    let (_, second) = call(&f.router, "POST", "/api/v1/do/query_messages", "").await;
    assert_eq!(second["kind"], "debounced");

    let (status, snapshot) = call(&f.router, "GET", "/api/v1/messages", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["muted"], false);

    f.clock.advance(Duration::from_secs(6 * 60));
    let (_, third) = call(&f.router, "POST", "/api/v1/do/query_messages", "").await;
    assert_eq!(third["kind"], "messages");
}
