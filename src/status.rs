use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Only include non-secret runtime data.
    let phases = |list: &[crate::phase::Phase]| {
        list.iter()
            .map(|p| json!({ "name": p.name, "duration_ms": p.duration_ms, "cost": p.unit_cost }))
            .collect::<Vec<_>>()
    };

    let a = &state.config.analysis;
    let v = json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.provider.name(),
        "auth_required": state.token.is_some(),
        "analysis": {
            "phases": phases(&state.analysis.phases),
            "findings": { "min": a.findings_min, "max": a.findings_max },
            "latency_scale": a.latency_scale,
            "max_run_secs": a.max_run_secs,
        },
        "budget": {
            "max_run_cost_usd": a.max_run_cost_usd,
            "warning_percent": a.budget_warning_percent,
        },
        "graph": {
            "phases": phases(&state.graph.phases),
        },
    });

    (StatusCode::OK, Json(v)).into_response()
}
