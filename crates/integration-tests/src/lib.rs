//! Integration test support for Emporium.
//!
//! # Running Tests
//!
//! ```bash
//! # Database tests need a PostgreSQL server; each test gets a fresh
//! # database with crates/api/migrations applied.
//! DATABASE_URL=postgres://localhost/emporium cargo test -p emporium-integration-tests -- --ignored
//! ```
//!
//! The payment gateway is replaced by [`MockGateway`], an in-process axum
//! server that accepts every order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use url::Url;

use emporium_api::config::{ApiConfig, GatewayConfig};
use emporium_api::db::{ProductRepository, ProductSeed, UserRepository, VariantSeed};
use emporium_api::gateway::SignatureVerifier;
use emporium_api::models::User;
use emporium_api::state::AppState;
use emporium_core::{
    CurrencyCode, CustomerInfo, Email, LineItemRequest, OrderId, PaymentId, ProductId,
    ShippingPolicy, UserRole,
};

/// Public key id handed to the mock gateway.
pub const GATEWAY_KEY_ID: &str = "rzp_test_emporium";

/// Secret used for both gateway auth and payment signatures.
pub const GATEWAY_SECRET: &str = "tK9#vQ2$mW7!pL4@xR8^nB3&";

#[derive(Clone)]
struct MockState {
    created: Arc<AtomicU64>,
    reject: bool,
}

/// In-process stand-in for the payment gateway's order endpoint.
pub struct MockGateway {
    base_url: Url,
    created: Arc<AtomicU64>,
}

impl MockGateway {
    /// Start a gateway that accepts every order.
    pub async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Start a gateway that rejects every order with a 400 error body.
    pub async fn rejecting() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(reject: bool) -> Self {
        let state = MockState {
            created: Arc::new(AtomicU64::new(0)),
            reject,
        };
        let created = Arc::clone(&state.created);

        let app = Router::new()
            .route("/v1/orders", post(create_order))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("mock gateway address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}/")).expect("mock gateway url"),
            created,
        }
    }

    /// Number of orders the gateway has accepted.
    #[must_use]
    pub fn orders_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    fn config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.base_url.clone(),
            key_id: GATEWAY_KEY_ID.to_owned(),
            key_secret: SecretString::from(GATEWAY_SECRET),
        }
    }
}

async fn create_order(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if state.reject {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {"code": "BAD_REQUEST_ERROR", "description": "Order amount exceeds limit"}
            })),
        );
    }

    let n = state.created.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::OK,
        Json(json!({
            "id": format!("order_T{n:06}"),
            "amount": body["amount"],
            "currency": body["currency"],
            "status": "created",
        })),
    )
}

/// API configuration pointing at `gateway`, with SMTP disabled.
#[must_use]
pub fn test_config(gateway: Option<&MockGateway>) -> ApiConfig {
    ApiConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost".to_owned(),
        gateway: gateway.map(MockGateway::config),
        signature_secret: gateway.map(|_| SecretString::from(GATEWAY_SECRET)),
        currency: CurrencyCode::INR,
        shipping: ShippingPolicy::default(),
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Application state over a `#[sqlx::test]` pool.
#[must_use]
pub fn test_state(pool: PgPool, gateway: Option<&MockGateway>) -> AppState {
    AppState::new(test_config(gateway), pool).expect("state without SMTP")
}

/// Signature the checkout widget would return for a successful payment.
#[must_use]
pub fn sign(order_id: &OrderId, payment_id: &PaymentId) -> String {
    SignatureVerifier::new(SecretString::from(GATEWAY_SECRET))
        .sign(order_id, payment_id)
        .expect("HMAC accepts any key length")
}

/// Create a user with the given role.
pub async fn create_user(pool: &PgPool, email: &str, role: UserRole) -> User {
    let email = Email::parse(email).expect("valid email");
    let users = UserRepository::new(pool);
    users
        .create_with_password(&email, "Test User", "$argon2id$unused")
        .await
        .expect("create user");
    users.set_role(&email, role).await.expect("set role")
}

/// Seed a simple product.
pub async fn seed_simple(pool: &PgPool, id: i32, name: &str, price: i64, stock: i32) {
    seed(
        pool,
        ProductSeed {
            id,
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::from(price),
            stock,
            variants: Vec::new(),
        },
    )
    .await;
}

/// Seed a product whose variants are `(name, price, stock)`.
pub async fn seed_variable(pool: &PgPool, id: i32, name: &str, variants: &[(&str, i64, i32)]) {
    seed(
        pool,
        ProductSeed {
            id,
            name: name.to_owned(),
            description: String::new(),
            price: Decimal::ZERO,
            stock: 0,
            variants: variants
                .iter()
                .map(|(name, price, stock)| VariantSeed {
                    name: (*name).to_owned(),
                    price: Decimal::from(*price),
                    stock: *stock,
                })
                .collect(),
        },
    )
    .await;
}

async fn seed(pool: &PgPool, product: ProductSeed) {
    ProductRepository::new(pool)
        .upsert_seed(&product)
        .await
        .expect("seed product");
}

/// Current `(product stock, variant stocks)`.
pub async fn stock_of(pool: &PgPool, id: i32) -> (i32, Vec<i32>) {
    let product = ProductRepository::new(pool)
        .get(ProductId::new(id))
        .await
        .expect("load product")
        .expect("product exists");
    let variants = product.variants.iter().map(|v| v.stock).collect();
    (product.stock, variants)
}

/// A line item request.
#[must_use]
pub const fn line(product_id: i32, variant_index: Option<i32>, quantity: i32) -> LineItemRequest {
    LineItemRequest {
        product_id: ProductId::new(product_id),
        variant_index,
        quantity,
    }
}

/// Shipping details in the discounted zone.
#[must_use]
pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Asha Patil".to_owned(),
        email: Email::parse("asha@example.in").expect("valid email"),
        phone: "9820000000".to_owned(),
        address_line1: "12 Lake Road".to_owned(),
        address_line2: None,
        city: "Pune".to_owned(),
        state: "MH".to_owned(),
        postal_code: "411001".to_owned(),
    }
}
