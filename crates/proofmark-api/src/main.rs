use std::net::SocketAddr;

use anyhow::{Context, Result};
use proofmark_api::{app, telemetry, AppState, HttpConfig, DEFAULT_MAX_BODY_BYTES};
use proofmark_registry::{Settings, VerificationEngine};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(env_flag("PROOFMARK_LOG_JSON"));

    let settings = Settings::from_env()?;
    let ctx = settings.context()?;
    let repo = settings.open_repository()?;
    let registry = settings.open_registry().await?;
    let registry_configured = registry.is_some();
    if !registry_configured {
        info!("no registry configured; verification uses the database only");
    }

    let engine = VerificationEngine::new(ctx.clone(), registry, repo);
    let state = AppState::new(ctx, engine, registry_configured);

    let http = HttpConfig {
        max_body_bytes: match std::env::var("PROOFMARK_MAX_BODY_BYTES") {
            Ok(v) => v.parse().context("PROOFMARK_MAX_BODY_BYTES must be an integer")?,
            Err(_) => DEFAULT_MAX_BODY_BYTES,
        },
        cors_origins: std::env::var("PROOFMARK_CORS_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default(),
    };

    let addr: SocketAddr = std::env::var("PROOFMARK_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("PROOFMARK_LISTEN_ADDR must be host:port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;

    info!(%addr, "proofmark-api listening");
    axum::serve(listener, app(state, &http))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("proofmark-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| matches!(v.as_str(), "1" | "true" | "yes"))
}
