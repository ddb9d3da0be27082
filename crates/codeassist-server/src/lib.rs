//! HTTP relay forwarding code tasks to a chat-completion service.
//!
//! Routes:
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | POST | `/convert` | `{code, language}` | `{convertedCode}` |
//! | POST | `/debug` | `{code}` | `{debugResult}` |
//! | POST | `/qualitycheck` | `{code}` | `{qualityCheckResult}` |
//! | GET | `/health` | | `OK` |
//!
//! Task routes sit behind the per-IP [`rate_limit`] middleware; CORS allows
//! any origin.

mod dto;
mod error;
mod handlers;
mod services;

pub mod rate_limit;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use codeassist_llm::CompletionClient;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::AppError;
pub use rate_limit::{InMemoryStore, RateLimitStore, RateLimiter};

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub llm: Arc<dyn CompletionClient>,
    pub rate_limiter: RateLimiter,
}

impl ServerState {
    pub fn new(llm: Arc<dyn CompletionClient>, rate_limiter: RateLimiter) -> Self {
        Self { llm, rate_limiter }
    }
}

/// Builds the application router.
pub fn app(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let limited_routes = Router::new()
        .route("/convert", post(handlers::tasks::convert))
        .route("/debug", post(handlers::tasks::debug))
        .route("/qualitycheck", post(handlers::tasks::quality_check))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::enforce))
        .layer(trace_layer);

    Router::new()
        .merge(limited_routes)
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state)
}
