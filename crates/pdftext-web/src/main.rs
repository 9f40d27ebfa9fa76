use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pdftext_core::TextService;
use pdftext_core::config_file;
use pdftext_mupdf::MupdfEngine;

mod handlers;
mod models;
mod routes;
mod state;

use state::AppState;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, file) = config_file::load_effective_config();
    let bind = config_file::resolve_bind(&file);
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid bind address `{bind}`"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.num_workers)
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(serve(config, addr))
}

async fn serve(config: pdftext_core::Config, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!(
        memory_threshold_mebibytes = config.memory_threshold_mebibytes,
        dehyphenate = config.dehyphenate,
        external_program = %config.external_program,
        workers = config.num_workers,
        "configuration loaded"
    );

    let service = TextService::new(config, Arc::new(MupdfEngine::new()))
        .context("failed to build HTTP client")?;
    let app = routes::router(AppState { service });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
