//! Integration tests for glyph-api endpoints
//!
//! Backends are shell scripts run through /bin/sh, so these tests are unix-only.
//!
//! Tests cover:
//! - Info, health and build information endpoints
//! - Inference end to end: artifact, ledger row, response body
//! - Error mapping: malformed bodies, failing and unavailable backends
//! - Feedback on known and unknown artifacts
//! - CORS allow-list

#![cfg(unix)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

use glyph_api::{build_router, AppState, BackendInvoker, BackendSpec, InferencePipeline};
use glyph_common::config::RootFolder;
use glyph_common::labels::LR_LABELS;
use glyph_common::BackendKind;

const ORIGIN: &str = "http://localhost:5173";

/// Test helper: backend script that prints `label` once the artifact exists
fn label_script(dir: &Path, name: &str, label: &str) -> BackendSpec {
    // $1 = --input, $2 = artifact path
    let body = format!("test -f \"$2\" || exit 2\necho '{}'\n", label);
    script(dir, name, &body)
}

fn script(dir: &Path, name: &str, body: &str) -> BackendSpec {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    BackendSpec::new("/bin/sh").with_args([path.to_string_lossy().into_owned()])
}

/// Test helper: state with LR printing "A", CNN failing, RNN disabled
fn setup_state(temp_dir: &TempDir) -> AppState {
    let scripts = temp_dir.path().join("scripts");
    std::fs::create_dir_all(&scripts).unwrap();

    let invoker = BackendInvoker::new(Some(Duration::from_secs(10)))
        .with_backend(BackendKind::Lr, label_script(&scripts, "lr.sh", "A"))
        .with_backend(
            BackendKind::Cnn,
            script(&scripts, "cnn.sh", "echo 'cnn model crashed' >&2\nexit 1\n"),
        )
        .with_backend(
            BackendKind::Rnn,
            label_script(&scripts, "rnn.sh", "a or t?")
                .with_model(temp_dir.path().join("models/rnn/rnn.onnx")),
        );

    let root = RootFolder::new(temp_dir.path().join("root"));
    let pipeline = InferencePipeline::for_root(&root, invoker);
    AppState::new(pipeline, vec![ORIGIN.to_string()])
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn blank_pixels() -> Value {
    json!({ "pixels": vec![0.0f32; 784] })
}

// =============================================================================
// Info Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_root_message() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["message"].as_str().unwrap().contains("running"));
}

#[tokio::test]
async fn test_health_reports_backends() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["module"], "glyph-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_u64());
    assert!(body.get("last_error").is_none());

    let backends = body["backends"].as_array().unwrap();
    assert_eq!(backends.len(), 3);
    assert_eq!(backends[0]["kind"], "lr");
    assert_eq!(backends[0]["available"], true);
    assert_eq!(backends[2]["kind"], "rnn");
    assert_eq!(backends[2]["available"], false);
}

#[tokio::test]
async fn test_build_info() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app.oneshot(get("/api/buildinfo")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["git_hash"].is_string());
    assert!(body["build_timestamp"].is_string());
    assert!(body["build_profile"].is_string());
}

// =============================================================================
// Inference Tests
// =============================================================================

#[tokio::test]
async fn test_blank_lr_request_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);
    let app = build_router(state.clone());

    let response = app
        .oneshot(post_json("/lrinfer", &blank_pixels()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["img_name"], "raw-img-1.png");
    let label = body["label"].as_str().unwrap();
    assert_eq!(label.chars().count(), 1);
    assert!(LR_LABELS.contains(&label.chars().next().unwrap()));

    let artifact = temp_dir.path().join("root/tmp/raw-img-1.png");
    assert!(artifact.exists());

    let rows = state.pipeline.ledger().rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].img_name, "raw-img-1.png");
    assert_eq!(rows[0].model_used, "lr");
    assert_eq!(rows[0].result_inferred, label);
    assert_eq!(rows[0].user_feedback, "");
}

#[tokio::test]
async fn test_sequential_requests_number_artifacts() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    for expected in ["raw-img-1.png", "raw-img-2.png", "raw-img-3.png"] {
        let response = build_router(state.clone())
            .oneshot(post_json("/lrinfer", &blank_pixels()))
            .await
            .unwrap();
        let body = extract_json(response.into_body()).await;
        assert_eq!(body["img_name"], expected);
    }

    assert_eq!(state.pipeline.ledger().row_count().unwrap(), 3);
}

#[tokio::test]
async fn test_failing_backend_returns_500_without_row() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    let response = build_router(state.clone())
        .oneshot(post_json("/cnninfer", &blank_pixels()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "INFERENCE_FAILED");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("cnn model crashed"));

    assert_eq!(state.pipeline.ledger().row_count().unwrap(), 0);

    // The failure is visible on /health
    let response = build_router(state)
        .oneshot(get("/health"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert!(body["last_error"]
        .as_str()
        .unwrap()
        .contains("cnn model crashed"));
}

#[tokio::test]
async fn test_unavailable_backend_returns_503() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    let response = build_router(state.clone())
        .oneshot(post_json("/rnninfer", &blank_pixels()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");
    assert_eq!(state.pipeline.ledger().row_count().unwrap(), 0);

    // Other backends keep serving
    let response = build_router(state)
        .oneshot(post_json("/lrinfer", &blank_pixels()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_pixel_count_is_rejected_before_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    let response = build_router(state.clone())
        .oneshot(post_json("/lrinfer", &json!({ "pixels": vec![0.0f32; 783] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    assert!(!temp_dir.path().join("root/tmp").exists());
    assert_eq!(state.pipeline.ledger().row_count().unwrap(), 0);
}

#[tokio::test]
async fn test_out_of_range_pixels_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let mut pixels = vec![0.0f32; 784];
    pixels[100] = 1.5;
    let response = app
        .oneshot(post_json("/cnninfer", &json!({ "pixels": pixels })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let request = Request::builder()
        .method("POST")
        .uri("/lrinfer")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"pixels\": [0.0, "))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

// =============================================================================
// Feedback Tests
// =============================================================================

#[tokio::test]
async fn test_feedback_updates_matching_row() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    for _ in 0..2 {
        build_router(state.clone())
            .oneshot(post_json("/lrinfer", &blank_pixels()))
            .await
            .unwrap();
    }

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/feedback",
            &json!({ "img_name": "raw-img-2.png", "user_feedback": "incorrect" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body, json!({ "status": "feedback recorded" }));

    let rows = state.pipeline.ledger().rows().unwrap();
    assert_eq!(rows[0].user_feedback, "");
    assert_eq!(rows[1].user_feedback, "incorrect");
}

#[tokio::test]
async fn test_feedback_for_unknown_artifact_is_acknowledged() {
    let temp_dir = TempDir::new().unwrap();
    let state = setup_state(&temp_dir);

    build_router(state.clone())
        .oneshot(post_json("/lrinfer", &blank_pixels()))
        .await
        .unwrap();
    let before = std::fs::read_to_string(state.pipeline.ledger().path()).unwrap();

    let response = build_router(state.clone())
        .oneshot(post_json(
            "/feedback",
            &json!({ "img_name": "raw-img-999.png", "user_feedback": "correct" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let after = std::fs::read_to_string(state.pipeline.ledger().path()).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_feedback_missing_field_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app
        .oneshot(post_json("/feedback", &json!({ "img_name": "raw-img-1.png" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// CORS Tests
// =============================================================================

fn preflight(origin: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri("/lrinfer")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_cors_allows_listed_origin() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app.oneshot(preflight(ORIGIN)).await.unwrap();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        ORIGIN
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_unlisted_origin() {
    let temp_dir = TempDir::new().unwrap();
    let app = build_router(setup_state(&temp_dir));

    let response = app
        .oneshot(preflight("http://evil.example"))
        .await
        .unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}
