use anyhow::Context;
use axum::http::StatusCode;
use axum::routing::get;
use clap::Parser;

mod bootstrap;
mod cli;
mod config;
mod logging_plugin;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let boot = bootstrap::bootstrap(&cli).await.context("bootstrap gateway")?;

    let state = bifrost_http::AppState::new(std::sync::Arc::new(boot.dispatcher.clone()), boot.mcp.clone());
    let app = bifrost_http::bifrost_router(state)
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }));

    let bind = format!("{}:{}", boot.global.host, boot.global.port);
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("bind {bind}"))?;
    tracing::info!(bind = %bind, providers = ?boot.dispatcher.provider_ids().collect::<Vec<_>>(), "bifrost listening");

    let shutdown_dispatcher = boot.dispatcher.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, draining worker pools and running plugin cleanup");
            shutdown_dispatcher.shutdown().await;
        })
        .await
        .context("serve")?;

    Ok(())
}
