use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use intake_api::{app, AppState, EventClient, STRUCTURED_CONTENT_TYPE};
use intake_metrics::MetricsService;
use intake_models::{CloudEvent, Config, ErrorShape, IntakeError};
use intake_pipeline::CloudEventFunction;
use intake_testsupport::{fixtures, spawn_server, EventBuilder, Harness, INTAKE_BUCKET};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Records events and optionally fails with a fixed error.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<CloudEvent>>,
    fail_with_storage_error: bool,
}

#[async_trait]
impl CloudEventFunction for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    async fn call(&self, event: CloudEvent) -> Result<(), IntakeError> {
        self.seen.lock().unwrap().push(event);
        if self.fail_with_storage_error {
            return Err(IntakeError::storage("backend unavailable"));
        }
        Ok(())
    }
}

fn router_for(function: Arc<dyn CloudEventFunction>) -> Router {
    let metrics = Arc::new(MetricsService::new().unwrap());
    app(AppState::new(Config::default(), function, metrics))
}

fn binary_request(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("ce-id", "abc-123")
        .header("ce-source", "//storage.googleapis.com/projects/_/buckets/discovery-intake")
        .header("ce-type", "google.cloud.storage.object.v1.finalized")
        .header("ce-specversion", "1.0")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn binary_event_reaches_function() {
    let recorder = Arc::new(Recorder::default());
    let response = router_for(recorder.clone())
        .oneshot(binary_request(
            "/",
            json!({"bucket": "discovery-intake", "name": "case1/a.pdf"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"OK");

    let seen = recorder.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, "abc-123");
}

#[tokio::test]
async fn any_path_is_dispatched() {
    let recorder = Arc::new(Recorder::default());
    let response = router_for(recorder.clone())
        .oneshot(binary_request("/projects/x/triggers/y", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn structured_event_reaches_function() {
    let recorder = Arc::new(Recorder::default());
    let event = EventBuilder::finalized(INTAKE_BUCKET, "case1/a.pdf").build();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", STRUCTURED_CONTENT_TYPE)
        .body(Body::from(serde_json::to_vec(&event).unwrap()))
        .unwrap();

    let response = router_for(recorder.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(recorder.seen.lock().unwrap()[0], event);
}

#[tokio::test]
async fn malformed_event_is_a_bad_request() {
    let recorder = Arc::new(Recorder::default());
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = router_for(recorder.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let shape: ErrorShape = serde_json::from_slice(&body).unwrap();
    assert_eq!(shape.error_type, "InvalidCloudEvent");
    assert!(recorder.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn function_errors_become_server_errors() {
    let recorder = Arc::new(Recorder {
        fail_with_storage_error: true,
        ..Default::default()
    });
    let response = router_for(recorder)
        .oneshot(binary_request("/", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_and_metrics() {
    let router = router_for(Arc::new(Recorder::default()));

    let health = router
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let metrics = router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
    let text = to_bytes(metrics.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains("intake_events_total"));
}

#[tokio::test]
async fn oversized_bodies_are_refused() {
    let mut config = Config::default();
    config.server.max_request_body_size_mb = 1;
    let metrics = Arc::new(MetricsService::new().unwrap());
    let router = app(AppState::new(config, Arc::new(Recorder::default()), metrics));

    let big = "x".repeat(2 * 1024 * 1024);
    let response = router
        .oneshot(binary_request("/", json!({ "padding": big })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn client_delivers_to_live_analyzer() -> anyhow::Result<()> {
    let h = Harness::new();
    h.upload("case1/exhibit.pdf", fixtures::pdf_bytes());
    h.upload("loose.docx", fixtures::docx_bytes());

    let router = app(AppState::new(h.config.clone(), h.analyzer.clone(), h.metrics.clone()));
    let server = spawn_server(router).await?;
    let client = EventClient::new(&server.base_url);
    assert!(client.health().await?);

    let kept = EventBuilder::finalized(INTAKE_BUCKET, "case1/exhibit.pdf").build();
    assert_eq!(client.send_binary(&kept).await?.status().as_u16(), 200);
    assert!(h.exists("case1/exhibit.pdf"));

    let root = EventBuilder::finalized(INTAKE_BUCKET, "loose.docx").build();
    assert_eq!(client.send_structured(&root).await?.status().as_u16(), 200);
    assert!(!h.exists("loose.docx"));
    assert_eq!(h.audit_lines().len(), 1);
    Ok(())
}
