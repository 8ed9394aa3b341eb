use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigia_core::OnnxFaceEncoder;

mod catalog;
mod config;
mod engine;
mod error;
mod http;
mod recognition;
mod service;
mod upload;
mod webhook;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vigiad starting");

    let config = config::Config::from_env();
    tracing::info!(
        bind = %config.bind,
        model_dir = %config.model_dir.display(),
        tolerance = config.match_tolerance,
        "configuration loaded"
    );

    let scrfd_path = config.scrfd_model_path();
    let arcface_path = config.arcface_model_path();
    let encoder = OnnxFaceEncoder::load(&scrfd_path, &arcface_path)
        .with_context(|| format!("failed to load models ({scrfd_path}, {arcface_path})"))?;
    let engine = engine::spawn_engine(encoder).context("failed to spawn inference thread")?;

    let store = catalog::CatalogStore::new(&config.db_path, &config.known_faces_dir);
    match store.ensure_layout() {
        Ok(()) => tracing::info!(db = %store.db_path().display(), "catalog store ready"),
        Err(e) => tracing::error!(error = %e, "failed to prepare storage layout"),
    }

    let webhook = webhook::WebhookClient::new(config.webhook_url.clone(), config.webhook_timeout)
        .context("failed to build webhook client")?;
    if !webhook.is_configured() {
        tracing::warn!("VIGIA_WEBHOOK_URL not set; recognition results will not be relayed");
    }

    let service = Arc::new(service::FaceService::new(
        engine,
        store,
        webhook,
        config.match_tolerance,
    ));
    if let Err(e) = service.reload_catalog().await {
        tracing::error!(error = %e, "failed to load catalog; starting empty");
    }

    let app = http::router(service, config.index_path.clone(), config.max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!(addr = %config.bind, "vigiad ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await
        .context("server error")?;

    tracing::info!("vigiad shutting down");
    Ok(())
}
