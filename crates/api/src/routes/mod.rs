//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (strict rate limit)
//! POST /api/auth/register              - Create a customer account
//! POST /api/auth/login                 - Start a session
//! POST /api/auth/logout                - End the session
//! GET  /api/auth/me                    - Current user
//!
//! # Catalog
//! GET  /api/products                   - Product listing
//! GET  /api/products/{id}              - Product detail
//!
//! # Orders (requires auth)
//! POST /api/orders                     - Create order and gateway order
//! GET  /api/orders                     - Orders visible to the caller
//! GET  /api/orders/{id}                - Order detail (owner or admin)
//! POST /api/orders/verify              - Verify payment and deduct stock
//!
//! # Admin (requires admin role)
//! PUT  /api/admin/products/{id}/stock  - Overwrite stock
//! ```

pub mod admin;
pub mod auth;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{get, post, put},
};

use crate::error::AppError;
use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// JSON body extractor whose rejections render as `invalid-argument`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections render as `invalid-argument`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query extractor whose rejections render as `invalid-argument`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create).get(orders::index))
        .route("/verify", post(orders::verify))
        .route("/{id}", get(orders::show))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/products/{id}/stock", put(admin::update_stock))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/products", product_routes())
        .nest("/orders", order_routes())
        .nest("/admin", admin_routes())
        .layer(api_rate_limiter());

    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api", api)
}
