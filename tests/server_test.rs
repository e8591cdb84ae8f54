use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use harvestrelay::bootstrap::Runtime;
use harvestrelay::config::{Config, FetcherConfig, SinkProvider};
use harvestrelay::dispatch::DispatchMode;
use harvestrelay::server::{self, AppState};

const MAX_PAYLOAD: usize = 4096;

/// Builds a test app running continuations in process, with an isolated ledger
fn build_test_app(auth_token: Option<&str>) -> (Router, AppState, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut config = Config::default();
    config.sink.provider = SinkProvider::Memory;
    config.ledger.path = temp_dir.path().join("ledger");
    config.fetchers.insert(
        "static".to_string(),
        FetcherConfig {
            kind: "static".to_string(),
            defaults: Default::default(),
        },
    );

    let runtime = Runtime::build(&config, Some(DispatchMode::InProcess))
        .expect("Failed to build runtime");
    let state = AppState::new(&runtime, MAX_PAYLOAD, auth_token.map(str::to_string));

    (server::router(state.clone()), state, temp_dir)
}

fn invoke_request(worker: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/invoke/{}", worker))
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

fn static_payload(chain_id: Uuid) -> Value {
    json!({
        "harvest_type": "static",
        "collection_id": "466",
        "pages": [[{"id": 1}], [{"id": 2}]],
        "chain": {"id": chain_id, "link": 0},
    })
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Waits for a background invocation to reach a terminal chain state
async fn wait_for_completion(state: &AppState) {
    for _ in 0..200 {
        if state.metrics.snapshot().completed > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("invocation did not complete");
}

#[tokio::test]
async fn test_health() {
    let (app, _state, _temp) = build_test_app(None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["worker"], "async-fetch");
    assert_eq!(body["mode"], "in_process");
}

#[tokio::test]
async fn test_invoke_accepted_and_chain_recorded() {
    let (app, state, _temp) = build_test_app(None);
    let chain_id = Uuid::now_v7();

    let response = app
        .clone()
        .oneshot(invoke_request(
            "async-fetch",
            static_payload(chain_id).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["worker"], "async-fetch");
    assert!(body["invocation_id"].is_string());

    wait_for_completion(&state).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/chains/{}", chain_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let chain = body_json(response).await;
    assert_eq!(chain["state"], "completed");
    assert_eq!(chain["harvest_type"], "static");
    assert_eq!(chain["links"], 1);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let metrics = body_json(response).await;
    assert_eq!(metrics["executions"], 1);
    assert_eq!(metrics["completed"], 1);
}

#[tokio::test]
async fn test_invoke_unknown_worker() {
    let (app, _state, _temp) = build_test_app(None);

    let response = app
        .oneshot(invoke_request("other-worker", "{}"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "UNKNOWN_WORKER");
}

#[tokio::test]
async fn test_invoke_rejects_non_json_content_type() {
    let (app, _state, _temp) = build_test_app(None);

    let request = Request::builder()
        .method("POST")
        .uri("/invoke/async-fetch")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_invoke_rejects_invalid_body() {
    let (app, state, _temp) = build_test_app(None);

    let response = app
        .oneshot(invoke_request("async-fetch", "[not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.metrics.snapshot().executions, 0);
}

#[tokio::test]
async fn test_invoke_rejects_oversized_payload() {
    let (app, _state, _temp) = build_test_app(None);

    let padding = "x".repeat(MAX_PAYLOAD);
    let body = json!({"harvest_type": "static", "padding": padding}).to_string();
    let response = app.oneshot(invoke_request("async-fetch", body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_invoke_requires_bearer_token_when_configured() {
    let (app, _state, _temp) = build_test_app(Some("s3cret"));
    let body = static_payload(Uuid::now_v7()).to_string();

    let response = app
        .clone()
        .oneshot(invoke_request("async-fetch", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = invoke_request("async-fetch", body);
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer s3cret".parse().unwrap());
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_unknown_harvest_type_still_accepted() {
    let (app, state, _temp) = build_test_app(None);

    let response = app
        .oneshot(invoke_request(
            "async-fetch",
            json!({"harvest_type": "bogus"}).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    for _ in 0..200 {
        if state.metrics.snapshot().aborted > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("bogus invocation was not aborted");
}

#[tokio::test]
async fn test_get_chain_errors() {
    let (app, _state, _temp) = build_test_app(None);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/chains/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/chains/{}", Uuid::now_v7()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
