mod api;
mod bridge;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use crew_core::{ChildProcessLauncher, Settings};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::bridge::AppState;
use crate::config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("Grant Writer Gateway Initializing...");

    // 2. Fail fast on missing provider credentials; every child inherits them.
    Settings::from_env().context("provider configuration")?;
    let config = GatewayConfig::from_env().context("gateway configuration")?;

    // 3. The Body: one isolated grant-crew process per request
    if !config.crew_bin.exists() {
        warn!(
            path = %config.crew_bin.display(),
            "grant-crew binary not found; runs will fail until it is built"
        );
    }
    let launcher = ChildProcessLauncher::new(&config.crew_bin).current_dir(&config.workdir);
    info!(
        crew_bin = %config.crew_bin.display(),
        workdir = %config.workdir.display(),
        "pipeline launcher ready"
    );

    let state = AppState {
        launcher: Arc::new(launcher),
    };
    let app = bridge::router(state);

    // 4. Start Server
    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Gateway listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
