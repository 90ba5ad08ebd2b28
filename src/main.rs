use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use livedub::config::{AppConfig, StdEnv};
use livedub::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env(&StdEnv);
    tokio::fs::create_dir_all(&config.segments_root).await?;
    tokio::fs::create_dir_all(&config.hls_root).await?;

    let state = Arc::new(AppState::new(config.clone()));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "livedub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(state))
        .await?;
    Ok(())
}

async fn shutdown(state: Arc<AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown requested, stopping pipelines");
    state.shutdown_all().await;
}
