use crate::analysis::AnalysisOrchestrator;
use crate::error::ApiError;
use crate::events;
use crate::introspection;
use crate::request::AnalysisRequest;
use crate::session::GraphSessionDriver;
use crate::state::AppState;
use crate::transport;
use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn require_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(expected) = state.token.as_deref() {
        if bearer_token(req.headers()) != Some(expected) {
            return ApiError::Unauthorized.into_response();
        }
    }
    next.run(req).await
}

fn parse_body(body: Result<Json<AnalysisRequest>, JsonRejection>) -> Result<AnalysisRequest, ApiError> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(rejection) => Err(ApiError::InvalidArgument(rejection.body_text())),
    }
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "ok": true })))
}

pub async fn get_event_schema() -> impl IntoResponse {
    (StatusCode::OK, Json(introspection::event_schema()))
}

/// POST /v1/analysis/stream
///
/// Validation happens before the stream opens; an invalid body gets a plain
/// 400 and no frames.
pub async fn stream_analysis(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = parse_body(body)?.validate()?;
    debug!("analysis stream requested for {}", subject.describe());

    let (sink, rx) = events::channel(state.stream_buffer());
    let orchestrator = AnalysisOrchestrator::new(state.analysis.clone(), state.provider.clone());
    tokio::spawn(async move {
        orchestrator.run(subject, sink).await;
    });

    Ok(transport::sse_response(rx, state.keepalive()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQuery {
    pub vendor_id: Option<String>,
    pub threat_id: Option<String>,
}

/// GET /v1/network-graph
pub async fn get_network_graph(
    State(state): State<Arc<AppState>>,
    Query(q): Query<GraphQuery>,
) -> impl IntoResponse {
    let focus = q.vendor_id.as_deref().or(q.threat_id.as_deref());
    let driver = GraphSessionDriver::new(state.graph.clone());
    (StatusCode::OK, Json(driver.static_graph(focus)))
}

/// POST /v1/network-graph/live
pub async fn stream_network_graph(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = parse_body(body)?.validate()?;
    debug!("live graph requested for {}", subject.describe());

    let (sink, rx) = events::channel(state.stream_buffer());
    let driver = GraphSessionDriver::new(state.graph.clone());
    tokio::spawn(async move {
        driver.run_live(subject, sink).await;
    });

    Ok(transport::sse_response(rx, state.keepalive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut h = HeaderMap::new();
        assert_eq!(bearer_token(&h), None);
        h.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&h), Some("abc"));
        h.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&h), None);
    }
}
