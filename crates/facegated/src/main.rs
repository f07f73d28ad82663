use std::sync::Arc;

use anyhow::{Context, Result};
use facegate_core::OnnxFaceAnalyzer;
use tracing_subscriber::EnvFilter;

mod config;
mod dtos;
mod engine;
mod error;
mod handlers;
mod routes;
mod upload;

use config::Config;
use engine::EngineHandle;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub engine: EngineHandle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        bind = %config.bind_addr,
        model_dir = %config.model_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "facegated starting"
    );

    // Load models synchronously so a missing file stops startup.
    let analyzer = OnnxFaceAnalyzer::load(&config.model_dir, config.intra_threads)
        .context("failed to load face models")?;
    let engine = engine::spawn_engine(analyzer, config.engine_queue)
        .context("failed to spawn engine thread")?;

    let app = routes::create_router(Arc::new(AppState { engine }), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "facegated ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facegated shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
