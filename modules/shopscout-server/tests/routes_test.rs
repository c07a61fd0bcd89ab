//! REST surface over an in-memory pipeline.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use shopscout_domains::pipeline::{JobQueue, JobReceiver};
use shopscout_domains::store::MemoryStore;
use shopscout_domains::testing::{MockLlm, MockMediaProcessor};
use shopscout_domains::{Pipeline, PipelineDeps};
use shopscout_server::routes::build_router;

/// The receiver is returned so queued jobs stay pending instead of failing to send.
fn app(store: &Arc<MemoryStore>) -> (Router, Pipeline, JobReceiver) {
    let deps = PipelineDeps::builder()
        .catalog(store.clone())
        .taxonomy(store.clone())
        .runs(store.clone())
        .extraction_llm(Arc::new(MockLlm::new()))
        .classification_llm(Arc::new(MockLlm::new().always(r#"{"group":"tech"}"#)))
        .media(Arc::new(MockMediaProcessor::new()))
        .build();
    let (queue, receiver) = JobQueue::new();
    let pipeline = Pipeline::new(deps, queue);
    (build_router(pipeline.clone(), &[]), pipeline, receiver)
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_answers_ok() {
    let store = Arc::new(MemoryStore::new());
    let (app, _, _rx) = app(&store);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn nothing_to_do_is_not_an_error() {
    let store = Arc::new(MemoryStore::new());
    let profile = store.add_profile("gadget.hub");
    let (app, _, _rx) = app(&store);

    let (status, body) = send(app, "POST", &format!("/profiles/{}/scrape", profile.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_applicable");
    assert!(body["reason"].is_string());
}

#[tokio::test]
async fn processing_trigger_reports_the_queued_run() {
    let store = Arc::new(MemoryStore::new());
    let profile = store.add_profile("gadget.hub");
    store.add_post(profile.id, "C1", Some("iPhone"));
    store.add_post(profile.id, "C2", Some("Pixel"));
    let (app, pipeline, _rx) = app(&store);

    let (status, body) = send(app, "POST", &format!("/profiles/{}/process", profile.id)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");
    assert_eq!(body["posts_queued"], 2);
    assert_eq!(pipeline.queue().outstanding(), 2);

    let run_id = body["run_id"].as_str().unwrap().to_string();
    let app = build_router(pipeline.clone(), &[]);
    let (status, run) = send(app, "GET", &format!("/runs/{run_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "running");
    assert_eq!(run["posts_to_process"], 2);

    let app = build_router(pipeline, &[]);
    let (status, run) = send(app, "POST", &format!("/runs/{run_id}/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["status"], "cancelled");
}

#[tokio::test]
async fn unknown_ids_answer_not_found() {
    let store = Arc::new(MemoryStore::new());
    let (app, _, _rx) = app(&store);

    let (status, body) = send(app.clone(), "GET", &format!("/runs/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("run"));

    let (status, _) = send(app, "POST", &format!("/profiles/{}/pipeline", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn category_tree_nests_children() {
    let store = Arc::new(MemoryStore::new());
    let electronics = store.add_category("Electronics", None);
    store.add_category("Phones", Some(electronics.id));
    let (app, _, _rx) = app(&store);

    let (status, body) = send(app, "GET", "/categories/tree").await;
    assert_eq!(status, StatusCode::OK);
    let roots = body.as_array().unwrap();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], "Electronics");
    assert_eq!(roots[0]["children"][0]["name"], "Phones");
}

#[tokio::test]
async fn cleanup_returns_a_report() {
    let store = Arc::new(MemoryStore::new());
    let (app, _, _rx) = app(&store);

    let (status, body) = send(app, "POST", "/runs/cleanup").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], Value::Array(Vec::new()));
    assert_eq!(body["failed"], Value::Array(Vec::new()));
}
