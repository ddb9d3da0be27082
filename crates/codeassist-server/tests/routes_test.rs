use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use codeassist_config::RateLimitSettings;
use codeassist_core::{CompletionRequest, RelayError};
use codeassist_llm::{CompletionClient, LlmMetrics, LlmResponse};
use codeassist_server::rate_limit::{WindowHit, RATE_LIMIT_MESSAGE};
use codeassist_server::{app, RateLimitStore, RateLimiter, ServerState};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Completion client returning a canned reply and recording every prompt.
struct MockLlm {
    reply: Result<String, String>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl MockLlm {
    fn replying(content: &str) -> Arc<Self> {
        Arc::new(Self { reply: Ok(content.to_string()), calls: Mutex::new(Vec::new()) })
    }

    fn failing(cause: &str) -> Arc<Self> {
        Arc::new(Self { reply: Err(cause.to_string()), calls: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockLlm {
    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, RelayError> {
        self.calls.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(content) => Ok(LlmResponse { content: content.clone(), metrics: LlmMetrics::default() }),
            Err(cause) => Err(RelayError::LlmError(cause.clone())),
        }
    }
}

/// Store that is always down.
struct FailingStore;

#[async_trait]
impl RateLimitStore for FailingStore {
    async fn hit(&self, _key: &str, _window: Duration) -> Result<WindowHit, RelayError> {
        Err(RelayError::Store("connection refused".into()))
    }
}

fn router(llm: Arc<MockLlm>) -> Router {
    let limiter = RateLimiter::in_memory(RateLimitSettings::default());
    app(Arc::new(ServerState::new(llm, limiter)))
}

fn post(path: &str, body: impl Into<Body>, ip: [u8; 4]) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    req.extensions_mut().insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    req
}

fn post_json(path: &str, body: Value, ip: [u8; 4]) -> Request<Body> {
    post(path, body.to_string(), ip)
}

async fn body_json(resp: Response<Body>) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(resp: Response<Body>) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const CLIENT_A: [u8; 4] = [203, 0, 113, 7];
const CLIENT_B: [u8; 4] = [198, 51, 100, 22];

#[tokio::test]
async fn test_convert_returns_converted_code() {
    let llm = MockLlm::replying("print(1)");
    let app = router(llm.clone());

    let resp = app
        .oneshot(post_json("/convert", json!({ "code": "console.log(1)", "language": "Python" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "convertedCode": "print(1)" }));

    let calls = llm.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system, "Convert the following code to Python :\n\nconsole.log(1)");
    assert_eq!(calls[0].user, "console.log(1)");
    assert_eq!(calls[0].max_tokens, 100);
}

#[tokio::test]
async fn test_debug_scenario() {
    let llm = MockLlm::replying("No bugs found.");
    let app = router(llm.clone());

    let resp = app
        .oneshot(post_json("/debug", json!({ "code": "for(i=0;i<10;i++) console.log(i)" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "debugResult": "No bugs found." }));
    assert_eq!(llm.calls()[0].max_tokens, 200);
}

#[tokio::test]
async fn test_quality_check_returns_result() {
    let llm = MockLlm::replying("Use consistent indentation.");
    let app = router(llm.clone());

    let resp = app
        .oneshot(post_json("/qualitycheck", json!({ "code": "if(x){y()}" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "qualityCheckResult": "Use consistent indentation." }));

    let call = &llm.calls()[0];
    assert!(call.system.starts_with("Check the quality of the following code"));
    assert_eq!(call.max_tokens, 200);
}

#[tokio::test]
async fn test_upstream_failure_yields_static_500() {
    let cases = [
        ("/convert", json!({ "code": "x", "language": "Go" }), "Failed to convert the code."),
        ("/debug", json!({ "code": "x" }), "Failed to debug the code."),
        ("/qualitycheck", json!({ "code": "x" }), "Failed to check the code quality."),
    ];

    for (path, body, message) in cases {
        let app = router(MockLlm::failing("connection reset by peer"));

        let resp = app.oneshot(post_json(path, body, CLIENT_A)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", path);
        assert_eq!(body_json(resp).await, json!({ "error": message }), "{}", path);
    }
}

#[tokio::test]
async fn test_missing_fields_still_forwarded() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    let resp = app.oneshot(post_json("/convert", json!({}), CLIENT_A)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let calls = llm.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system, "Convert the following code to  :\n\n");
    assert_eq!(calls[0].user, "");
}

#[tokio::test]
async fn test_non_json_body_still_forwarded() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    let mut req = post("/debug", "not json at all", CLIENT_A);
    req.headers_mut().insert("content-type", "text/plain".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({ "debugResult": "ok" }));
    assert_eq!(llm.calls().len(), 1);
}

#[tokio::test]
async fn test_array_body_forwarded_without_fields() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    let resp = app
        .oneshot(post_json("/convert", json!(["console.log(1)", "Go"]), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let calls = llm.calls();
    assert_eq!(calls[0].system, "Convert the following code to  :\n\n");
    assert_eq!(calls[0].user, "");
}

#[tokio::test]
async fn test_eleventh_request_is_rate_limited() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    for i in 0..10 {
        let resp = app
            .clone()
            .oneshot(post_json("/debug", json!({ "code": "x" }), CLIENT_A))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK, "request {}", i + 1);
        assert_eq!(resp.headers()["x-ratelimit-remaining"], (9 - i).to_string().as_str());
    }

    let resp = app
        .oneshot(post_json("/debug", json!({ "code": "x" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(resp.headers().contains_key("retry-after"));
    assert_eq!(resp.headers()["x-ratelimit-limit"], "10");
    assert_eq!(body_text(resp).await, RATE_LIMIT_MESSAGE);
    assert_eq!(llm.calls().len(), 10);
}

#[tokio::test]
async fn test_quota_is_per_client_and_shared_across_routes() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    let paths = ["/convert", "/debug", "/qualitycheck"];
    for i in 0..10 {
        let resp = app
            .clone()
            .oneshot(post_json(paths[i % 3], json!({ "code": "x" }), CLIENT_A))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let blocked = app
        .clone()
        .oneshot(post_json("/qualitycheck", json!({ "code": "x" }), CLIENT_A))
        .await
        .unwrap();
    assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .oneshot(post_json("/qualitycheck", json!({ "code": "x" }), CLIENT_B))
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
    assert_eq!(other.headers()["x-ratelimit-remaining"], "9");
}

#[tokio::test]
async fn test_rate_limit_store_failure_lets_request_through() {
    let llm = MockLlm::replying("ok");
    let limiter = RateLimiter::new(RateLimitSettings::default(), Arc::new(FailingStore));
    let app = app(Arc::new(ServerState::new(llm.clone(), limiter)));

    let resp = app
        .oneshot(post_json("/debug", json!({ "code": "x" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(llm.calls().len(), 1);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = router(MockLlm::replying("ok"));

    let mut req = post_json("/debug", json!({ "code": "x" }), CLIENT_A);
    req.headers_mut().insert("origin", "https://editor.example.com".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_preflight_does_not_consume_quota() {
    let app = router(MockLlm::replying("ok"));

    for _ in 0..12 {
        let mut req = Request::builder()
            .method("OPTIONS")
            .uri("/convert")
            .header("origin", "https://editor.example.com")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from((CLIENT_A, 40000))));

        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    let resp = app
        .oneshot(post_json("/convert", json!({ "code": "x", "language": "C" }), CLIENT_A))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "9");
}

#[tokio::test]
async fn test_rate_limited_response_keeps_cors_headers() {
    let llm = MockLlm::replying("ok");
    let limiter = RateLimiter::in_memory(RateLimitSettings { max_requests: 1, window: Duration::from_secs(3600) });
    let app = app(Arc::new(ServerState::new(llm, limiter)));

    let first = app
        .clone()
        .oneshot(post_json("/debug", json!({ "code": "x" }), CLIENT_A))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let mut req = post_json("/debug", json!({ "code": "x" }), CLIENT_A);
    req.headers_mut().insert("origin", "https://editor.example.com".parse().unwrap());
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let app = router(MockLlm::replying("ok"));

    for _ in 0..15 {
        let mut req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from((CLIENT_A, 40000))));

        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "OK");
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let llm = MockLlm::replying("ok");
    let app = router(llm.clone());

    let resp = app
        .oneshot(post_json("/translate", json!({ "code": "x" }), CLIENT_A))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await, json!({ "error": "no route for POST /translate" }));
    assert!(llm.calls().is_empty());
}
