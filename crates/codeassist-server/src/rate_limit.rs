//! Fixed-window request quota per client IP.
//!
//! Counting lives behind [`RateLimitStore`] so the in-memory map can be
//! swapped for an external store without touching route logic.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use codeassist_config::RateLimitSettings;
use codeassist_core::RelayError;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ServerState;

/// Body returned with every 429.
pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limit exceed Too many requests from this IP, please try again 1 hour.";

/// Counter state for one key after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Requests counted in the current window, including this one.
    pub count: u64,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// Increment-and-check counter store keyed by client.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Counts one request for `key`, opening a new window of length `window` if the old one expired.
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RelayError>;

    /// Drops windows older than `window`. Returns how many were removed.
    async fn purge_expired(&self, _window: Duration) -> Result<usize, RelayError> {
        Ok(0)
    }
}

#[derive(Debug)]
struct Window {
    count: u64,
    started: Instant,
}

/// Single-process store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: DashMap<String, Window>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    async fn hit(&self, key: &str, window: Duration) -> Result<WindowHit, RelayError> {
        let now = Instant::now();
        // The entry guard holds the shard lock, so read-modify-write is atomic per key.
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(Window { count: 0, started: now });

        if now.duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count += 1;

        Ok(WindowHit {
            count: entry.count,
            resets_in: window.saturating_sub(now.duration_since(entry.started)),
        })
    }

    async fn purge_expired(&self, window: Duration) -> Result<usize, RelayError> {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.duration_since(w.started) < window);
        Ok(before.saturating_sub(self.windows.len()))
    }
}

/// Outcome of checking one request against the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub resets_in: Duration,
}

impl RateLimitDecision {
    /// Whole seconds until reset, rounded up.
    pub fn reset_secs(&self) -> u64 {
        (self.resets_in.as_millis() as u64).div_ceil(1000)
    }

    /// Writes the `X-RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_secs()));
    }
}

/// Quota settings plus the store that counts against them.
pub struct RateLimiter {
    settings: RateLimitSettings,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings, store: Arc<dyn RateLimitStore>) -> Self {
        Self { settings, store }
    }

    /// A limiter over a fresh [`InMemoryStore`].
    pub fn in_memory(settings: RateLimitSettings) -> Self {
        Self::new(settings, Arc::new(InMemoryStore::new()))
    }

    /// Counts a request from `key` and decides whether it may proceed.
    pub async fn check(&self, key: &str) -> Result<RateLimitDecision, RelayError> {
        let hit = self.store.hit(key, self.settings.window).await?;
        let limit = self.settings.max_requests;

        Ok(RateLimitDecision {
            allowed: hit.count <= limit,
            limit,
            remaining: limit.saturating_sub(hit.count),
            resets_in: hit.resets_in,
        })
    }

    /// Spawns a task that purges expired windows once per window length.
    pub fn spawn_purge_task(&self) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let window = self.settings.window;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired(window).await {
                    Ok(0) => {}
                    Ok(n) => info!("Purged {} expired rate-limit windows", n),
                    Err(e) => warn!("Rate-limit purge failed: {}", e),
                }
            }
        })
    }
}

/// Client key for a request: the peer IP, or `unknown` when no peer address is attached.
fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware enforcing the quota ahead of every task route.
pub async fn enforce(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    let decision = match state.rate_limiter.check(&key).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!("Rate limiter unavailable, letting request through: {}", e);
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        info!(client = %key, "Rate limit exceeded");
        let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
        let headers = response.headers_mut();
        decision.apply_headers(headers);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(decision.reset_secs()));
        return response;
    }

    debug!(client = %key, remaining = decision.remaining, "Request within quota");
    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}
