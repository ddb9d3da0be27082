//! Relay server entry point.
//!
//! Loads and validates configuration before binding, then serves the router
//! with peer addresses attached for rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use codeassist_config::RelayConfig;
use codeassist_llm::OpenAiClient;
use codeassist_server::{app, RateLimiter, ServerState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = RelayConfig::from_env().context("invalid relay configuration")?;
    info!("Loaded config: {:?}", config);

    let llm = OpenAiClient::new(&config.api_key, &config.model, config.api_base.as_deref());
    info!("Using completion model {}", llm.model());

    let rate_limiter = RateLimiter::in_memory(config.rate_limit);
    let _purge = rate_limiter.spawn_purge_task();
    info!(
        "Rate limit: {} requests per {}s per IP",
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs()
    );

    let state = Arc::new(ServerState::new(Arc::new(llm), rate_limiter));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server running on {}", addr);

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
