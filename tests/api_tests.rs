use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use serial_test::serial;
use std::sync::Arc;
use supply_sentinel::config::{AnalysisConfig, Config};
use supply_sentinel::findings::SyntheticFindingProvider;
use supply_sentinel::startup::{build_state, router};
use tower::ServiceExt;

fn fast_config() -> Config {
    Config {
        analysis: AnalysisConfig {
            latency_scale: 0.0,
            finding_pacing_ms: 0,
            ..AnalysisConfig::default()
        },
        ..Config::default()
    }
}

fn app(config: Config) -> Router {
    let provider = Arc::new(SyntheticFindingProvider::default().with_seed(1));
    router(build_state(config, provider).unwrap())
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// `data:` payloads of an SSE body, in order.
fn sse_frames(raw: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(raw)
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| serde_json::from_str(d.trim()).unwrap())
        .collect()
}

#[tokio::test]
async fn health_is_open() {
    let resp = app(fast_config()).oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["ok"], true);
}

#[tokio::test]
async fn status_reports_phases_without_secrets() {
    let resp = app(fast_config()).oneshot(get("/v1/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["analysis"]["phases"].as_array().unwrap().len(), 5);
    assert_eq!(v["auth_required"], false);
    assert_eq!(v["provider"], "synthetic");
}

#[tokio::test]
async fn analysis_without_identifier_is_rejected() {
    let resp = app(fast_config())
        .oneshot(post_json("/v1/analysis/stream", "{}"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let resp = app(fast_config())
        .oneshot(post_json("/v1/network-graph/live", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn analysis_stream_delivers_frames_until_end() {
    let resp = app(fast_config())
        .oneshot(post_json("/v1/analysis/stream", r#"{"vendorId":"V001"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(ct.starts_with("text/event-stream"));

    let frames = sse_frames(&body_bytes(resp).await);
    let kinds: Vec<&str> = frames.iter().map(|f| f["type"].as_str().unwrap()).collect();
    assert_eq!(kinds.first(), Some(&"status"));
    assert_eq!(&kinds[kinds.len() - 2..], &["analysis_complete", "end"]);
    assert_eq!(kinds.iter().filter(|k| **k == "step_complete").count(), 5);
}

#[tokio::test]
async fn static_graph_needs_no_identifier() {
    let resp = app(fast_config()).oneshot(get("/v1/network-graph")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = body_json(resp).await;
    assert_eq!(v["nodes"].as_array().unwrap().len(), 25);
    assert!(v["visualization_config"].is_object());

    let resp = app(fast_config())
        .oneshot(get("/v1/network-graph?vendorId=V004"))
        .await
        .unwrap();
    let v = body_json(resp).await;
    assert_eq!(v["metadata"]["focus"], "V004");
}

#[tokio::test]
async fn live_graph_stream_ends_with_end_frame() {
    let resp = app(fast_config())
        .oneshot(post_json("/v1/network-graph/live", r#"{"threatId":"T002"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let frames = sse_frames(&body_bytes(resp).await);
    assert_eq!(frames.first().unwrap()["type"], "graph_initial");
    assert_eq!(frames.last().unwrap()["type"], "end");
}

#[tokio::test]
async fn event_schema_is_served() {
    let resp = app(fast_config()).oneshot(get("/v1/schema/events")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["oneOf"].is_array());
}

#[tokio::test]
#[serial]
async fn token_guards_v1_routes_only() {
    std::env::set_var("SENTINEL_TEST_TOKEN", "s3cret");
    let mut config = fast_config();
    config.auth.token_required = true;
    config.auth.token_env = "SENTINEL_TEST_TOKEN".into();
    let app = app(config);
    std::env::remove_var("SENTINEL_TEST_TOKEN");

    let resp = app.clone().oneshot(get("/v1/status")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["code"], "UNAUTHORIZED");

    let req = Request::builder()
        .uri("/v1/status")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[test]
#[serial]
fn missing_token_fails_startup() {
    std::env::remove_var("SENTINEL_TEST_TOKEN");
    let mut config = fast_config();
    config.auth.token_required = true;
    config.auth.token_env = "SENTINEL_TEST_TOKEN".into();
    let provider = Arc::new(SyntheticFindingProvider::default());
    assert!(build_state(config, provider).is_err());
}
