use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use supply_sentinel::{config::Config, startup};
use tokio::net::TcpListener;
use tracing::info;

/// sentinel-server: streams supply-chain threat analyses and network risk graphs.
#[derive(Debug, Parser)]
#[command(name = "sentinel-server")]
#[command(version)]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address; overrides the config file and SENTINEL_BIND.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    startup::init_tracing();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env();
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let bind = config.server.bind.clone();
    let state = startup::build_state(config, startup::default_provider())?;
    let app = startup::router(state);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!("sentinel-server listening on http://{bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("sentinel-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
