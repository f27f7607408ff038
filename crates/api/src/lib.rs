//! Emporium order lifecycle API.
//!
//! Checkout pricing, payment-gateway orders, signature-verified capture
//! with transactional stock deduction, and manual stock adjustment.
//! Built as a library so the router can be exercised in tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.pool(), state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(session_layer)
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Method, header};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use emporium_core::{CurrencyCode, ShippingPolicy};

    use super::*;
    use crate::config::ApiConfig;

    fn test_app() -> Router {
        app_with_database("postgres://localhost/emporium_test")
    }

    fn app_with_database(database_url: &str) -> Router {
        let config = ApiConfig {
            database_url: SecretString::from(database_url),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            gateway: None,
            signature_secret: None,
            currency: CurrencyCode::INR,
            shipping: ShippingPolicy::default(),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
        };
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy(database_url)
            .unwrap();
        app(AppState::new(config, pool).unwrap())
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.9")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn direct_request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(request(Method::GET, "/health", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_orders_require_session() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/orders", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "unauthenticated");
    }

    #[tokio::test]
    async fn test_verify_requires_session() {
        let response = test_app()
            .oneshot(request(
                Method::POST,
                "/api/orders/verify",
                r#"{"order_id":"order_1","payment_id":"pay_1","signature":"00"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_path_is_invalid_argument() {
        let response = test_app()
            .oneshot(request(Method::GET, "/api/products/not-a-number", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "invalid-argument");
    }

    #[tokio::test]
    async fn test_auth_routes_are_rate_limited() {
        let app = test_app();

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(request(Method::POST, "/api/auth/login", "{"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = app
            .oneshot(request(Method::POST, "/api/auth/login", "{"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(error_code(response).await, "resource-exhausted");
    }

    #[tokio::test]
    async fn test_peer_address_keys_the_limiter() {
        let app = test_app().layer(MockConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40_000))));

        let response = app
            .oneshot(direct_request(Method::GET, "/api/orders"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(response).await, "unauthenticated");
    }

    #[tokio::test]
    async fn test_unknown_client_gets_error_envelope() {
        let response = test_app()
            .oneshot(direct_request(Method::GET, "/api/orders"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(response).await, "internal");
    }

    #[tokio::test]
    async fn test_session_store_failure_is_internal() {
        // Nothing listens on port 1, so loading the session fails.
        let app = app_with_database("postgres://127.0.0.1:1/emporium_test");
        let cookie = format!(
            "{}={}",
            middleware::session::SESSION_COOKIE_NAME,
            tower_sessions::session::Id::default()
        );
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/orders")
                    .header("x-forwarded-for", "203.0.113.9")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(response).await, "internal");
    }
}
