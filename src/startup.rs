use crate::{
    analysis::AnalysisSettings,
    config::Config,
    findings::{FindingProvider, SyntheticFindingProvider},
    routes, secrets,
    session::GraphSettings,
    state::AppState,
    status,
};
use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Build secrets store.
///
/// If `secrets_file` is provided, secrets resolve from: file -> env.
pub fn build_secrets_store(secrets_file: Option<PathBuf>) -> Result<Arc<dyn secrets::SecretStore>> {
    let secrets: Arc<dyn secrets::SecretStore> = if let Some(path) = &secrets_file {
        let file_store = secrets::EnvFileStore::load(path)?;
        Arc::new(secrets::CompositeStore::new(vec![
            Box::new(file_store),
            Box::new(secrets::EnvStore),
        ]))
    } else {
        Arc::new(secrets::EnvStore)
    };

    Ok(secrets)
}

/// Resolve token based on token requirement + secrets store.
pub fn resolve_token(
    token_required: bool,
    secrets: &Arc<dyn secrets::SecretStore>,
    token_env: &str,
) -> Result<Option<String>> {
    if !token_required {
        return Ok(None);
    }

    match secrets.get(token_env) {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        _ => anyhow::bail!(
            "auth token required but missing or empty in secrets store ({})",
            token_env
        ),
    }
}

/// Assemble shared state from a validated config.
pub fn build_state(config: Config, provider: Arc<dyn FindingProvider>) -> Result<Arc<AppState>> {
    config.validate()?;

    let secrets = build_secrets_store(config.auth.secrets_file.clone().map(PathBuf::from))?;
    let token = resolve_token(config.auth.token_required, &secrets, &config.auth.token_env)?;

    info!(
        "analysis: budget=${:.2}/run, max_run={}s, findings={}..={}, latency_scale={}, provider={}",
        config.analysis.max_run_cost_usd,
        config.analysis.max_run_secs,
        config.analysis.findings_min,
        config.analysis.findings_max,
        config.analysis.latency_scale,
        provider.name()
    );
    if token.is_some() {
        info!("auth: bearer token required on /v1 routes");
    }

    Ok(Arc::new(AppState {
        analysis: AnalysisSettings::from_config(&config.analysis),
        graph: GraphSettings::from_config(&config.analysis),
        config,
        provider,
        token,
    }))
}

pub fn default_provider() -> Arc<dyn FindingProvider> {
    Arc::new(SyntheticFindingProvider::default())
}

pub fn router(state: Arc<AppState>) -> Router {
    let v1 = Router::new()
        .route("/status", get(status::get_status))
        .route("/schema/events", get(routes::get_event_schema))
        .route("/analysis/stream", post(routes::stream_analysis))
        .route("/network-graph", get(routes::get_network_graph))
        .route("/network-graph/live", post(routes::stream_network_graph))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::require_token,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/v1", v1)
        .with_state(state)
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
