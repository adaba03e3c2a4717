//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (applied in order)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Access Guard   │ ← 403 if IP not allowed, then 429 if rate exceeded
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Adds X-Request-Id header
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Routes
//!
//! - `GET /{*path}` - Gateway lookup and forward (also `GET /`)
//! - `POST /example-post` - JSON echo
//!
//! Any other method on a known route gets 405 with a JSON detail.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{AccessGuardLayer, Gate, RequestIdLayer};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// The returned router needs the peer address, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // Allow-list runs first so rejected callers never consume rate budget.
    let gates: Vec<Arc<dyn Gate>> = vec![
        state.allow_list.clone() as Arc<dyn Gate>,
        Arc::new(state.rate_limiter.clone()),
    ];

    info!(
        allowed_ips = config.allowed_ips.len(),
        rate_limit_per_minute = state.rate_limiter.per_minute(),
        trusted_proxies = state.trusted_proxies.is_enabled(),
        "Access guard configured"
    );
    info!(
        max_size_kb = config.max_request_body_size / 1024,
        "Request body size limit configured"
    );

    Router::new()
        .route("/", get(handlers::forward))
        .route(
            "/example-post",
            post(handlers::example_post).get(handlers::forward),
        )
        .route("/{*path}", get(handlers::forward))
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer::new())
        .layer(AccessGuardLayer::new(gates, state.trusted_proxies.clone()))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::net::SocketAddr;

    use axum::body::{Body, to_bytes};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::credentials::StaticCredentials;
    use crate::endpoints::EndpointStore;
    use crate::error::NO_MAPPING_DETAIL;
    use crate::middleware::allow_list::FORBIDDEN_DETAIL;

    const YAML: &str = r#"
endpoints:
  /report:
    post_url: /gen
    target_host: http://127.0.0.1:9
    auth_method: bearer
    api_key_env: ROUTER_TEST_KEY
"#;

    fn app(rate_limit: u32) -> Router {
        let config = Config {
            rate_limit_per_minute: rate_limit,
            ..Config::default()
        };
        let state = AppState::new(
            config,
            EndpointStore::from_yaml_str(YAML).unwrap(),
            Arc::new(StaticCredentials::new()),
        )
        .unwrap();
        build_router(state)
    }

    fn request(method: &str, uri: &str, peer: [u8; 4], body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .extension(ConnectInfo(SocketAddr::from((peer, 40000))))
            .body(body)
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unmapped_path_returns_404_detail() {
        let response = app(10)
            .oneshot(request("GET", "/missing", [127, 0, 0, 1], Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["detail"], NO_MAPPING_DETAIL);
    }

    #[tokio::test]
    async fn test_root_path_is_a_lookup() {
        let response = app(10)
            .oneshot(request("GET", "/", [127, 0, 0, 1], Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_credential_returns_500() {
        let response = app(10)
            .oneshot(request("GET", "/report/?id=7", [127, 0, 0, 1], Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["detail"].as_str().unwrap().contains("ROUTER_TEST_KEY"));
    }

    #[tokio::test]
    async fn test_disallowed_ip_gets_403() {
        let response = app(10)
            .oneshot(request("GET", "/report", [10, 1, 2, 3], Body::empty()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["detail"], FORBIDDEN_DETAIL);
    }

    #[tokio::test]
    async fn test_missing_connect_info_gets_403() {
        let req = Request::builder().uri("/report").body(Body::empty()).unwrap();
        let response = app(10).oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rate_limit_applies_per_router() {
        let router = app(1);

        let first = router
            .clone()
            .oneshot(request("GET", "/missing", [127, 0, 0, 1], Body::empty()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::NOT_FOUND);

        let second = router
            .oneshot(request("GET", "/missing", [127, 0, 0, 1], Body::empty()))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["x-ratelimit-limit"], "1");
        assert_eq!(
            json_body(second).await["detail"],
            "Rate limit exceeded: 1 per 1 minute"
        );
    }

    #[tokio::test]
    async fn test_example_post_echoes_object() {
        let response = app(10)
            .oneshot(request(
                "POST",
                "/example-post",
                [127, 0, 0, 1],
                Body::from(r#"{"a":1}"#),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Received POST request");
        assert_eq!(body["payload"]["a"], 1);
    }

    #[tokio::test]
    async fn test_example_post_rejects_non_object() {
        let response = app(10)
            .oneshot(request("POST", "/example-post", [127, 0, 0, 1], Body::from("[1,2]")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_post_to_gateway_path_is_405() {
        let response = app(10)
            .oneshot(request("POST", "/report", [127, 0, 0, 1], Body::from("{}")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json_body(response).await["detail"], "Method Not Allowed");
    }
}
