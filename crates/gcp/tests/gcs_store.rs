use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use intake_gcp::{AccessTokens, GcsStore, MemoryStore, ObjectStore, Precondition};
use intake_models::IntakeError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

// Minimal JSON API emulator that keeps objects in a MemoryStore.

#[derive(Clone)]
struct FakeGcs {
    store: Arc<MemoryStore>,
    token: &'static str,
}

#[derive(Deserialize)]
struct ObjectQuery {
    alt: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadQuery {
    name: String,
    if_generation_match: Option<i64>,
}

fn authorized(state: &FakeGcs, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", state.token))
        .unwrap_or(false)
}

fn resource(meta: &intake_gcp::ObjectMeta) -> serde_json::Value {
    json!({
        "kind": "storage#object",
        "bucket": meta.bucket,
        "name": meta.name,
        "generation": meta.generation.to_string(),
        "size": meta.size.to_string(),
        "contentType": meta.content_type,
    })
}

async fn get_object(
    State(state): State<FakeGcs>,
    Path((bucket, name)): Path<(String, String)>,
    Query(query): Query<ObjectQuery>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if query.alt.as_deref() == Some("media") {
        match state.store.read(&bucket, &name).await.unwrap() {
            Some(object) => (
                [("x-goog-generation", object.generation.to_string())],
                object.data,
            )
                .into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    } else {
        match state.store.stat(&bucket, &name).await.unwrap() {
            Some(meta) => Json(resource(&meta)).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        }
    }
}

async fn delete_object(
    State(state): State<FakeGcs>,
    Path((bucket, name)): Path<(String, String)>,
) -> StatusCode {
    match state.store.delete(&bucket, &name).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::NOT_FOUND,
    }
}

async fn upload_object(
    State(state): State<FakeGcs>,
    Path(bucket): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let precondition = match query.if_generation_match {
        Some(generation) => Precondition::IfGenerationMatch(generation),
        None => Precondition::None,
    };
    match state
        .store
        .write(&bucket, &query.name, body, &content_type, precondition)
        .await
    {
        Ok(meta) => Json(resource(&meta)).into_response(),
        Err(IntakeError::PreconditionFailed { .. }) => StatusCode::PRECONDITION_FAILED.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn spawn_fake_gcs() -> anyhow::Result<(String, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let state = FakeGcs {
        store: store.clone(),
        token: "test-token",
    };
    let app = Router::new()
        .route(
            "/storage/v1/b/:bucket/o/:name",
            get(get_object).delete(delete_object),
        )
        .route("/upload/storage/v1/b/:bucket/o", post(upload_object))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((format!("http://{}", addr), store))
}

fn client(endpoint: &str) -> GcsStore {
    GcsStore::new(
        endpoint,
        reqwest::Client::new(),
        Arc::new(AccessTokens::fixed("test-token")),
    )
    .unwrap()
}

#[tokio::test]
async fn write_read_stat_delete_through_json_api() -> anyhow::Result<()> {
    let (endpoint, backing) = spawn_fake_gcs().await?;
    let gcs = client(&endpoint);

    let meta = gcs
        .write(
            "discovery-processed",
            "case1/depo.txt",
            Bytes::from("transcript"),
            "text/plain",
            Precondition::None,
        )
        .await?;
    assert_eq!(meta.name, "case1/depo.txt");
    assert_eq!(meta.size, 10);
    assert_eq!(
        backing.get_string("discovery-processed", "case1/depo.txt").as_deref(),
        Some("transcript")
    );

    let stat = gcs.stat("discovery-processed", "case1/depo.txt").await?.unwrap();
    assert_eq!(stat.generation, meta.generation);
    assert_eq!(stat.content_type.as_deref(), Some("text/plain"));

    let read = gcs.read("discovery-processed", "case1/depo.txt").await?.unwrap();
    assert_eq!(&read.data[..], b"transcript");
    assert_eq!(read.generation, meta.generation);

    gcs.delete("discovery-processed", "case1/depo.txt").await?;
    assert!(gcs.stat("discovery-processed", "case1/depo.txt").await?.is_none());
    assert!(gcs.read("discovery-processed", "case1/depo.txt").await?.is_none());
    assert!(matches!(
        gcs.delete("discovery-processed", "case1/depo.txt").await,
        Err(IntakeError::ObjectNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn stale_generation_maps_to_precondition_failed() -> anyhow::Result<()> {
    let (endpoint, backing) = spawn_fake_gcs().await?;
    let gcs = client(&endpoint);

    let first = backing.put("b", "logs/logs.txt", "one\n");
    backing.put("b", "logs/logs.txt", "one\ntwo\n");

    let result = gcs
        .write(
            "b",
            "logs/logs.txt",
            Bytes::from("one\nmine\n"),
            "text/plain",
            Precondition::IfGenerationMatch(first),
        )
        .await;
    assert!(matches!(result, Err(IntakeError::PreconditionFailed { .. })));

    let create_only = gcs
        .write(
            "b",
            "logs/logs.txt",
            Bytes::from("x"),
            "text/plain",
            Precondition::IfGenerationMatch(0),
        )
        .await;
    assert!(create_only.unwrap_err().is_conflict());
    assert_eq!(backing.get_string("b", "logs/logs.txt").as_deref(), Some("one\ntwo\n"));
    Ok(())
}

#[tokio::test]
async fn rejected_credentials_surface_as_storage_error() -> anyhow::Result<()> {
    let (endpoint, backing) = spawn_fake_gcs().await?;
    backing.put("b", "case1/a.pdf", "%PDF");
    let gcs = GcsStore::new(
        &endpoint,
        reqwest::Client::new(),
        Arc::new(AccessTokens::fixed("wrong")),
    )?;

    let err = gcs.stat("b", "case1/a.pdf").await.unwrap_err();
    assert!(matches!(err, IntakeError::StorageError { .. }));
    assert!(err.to_string().contains("401"));
    Ok(())
}
