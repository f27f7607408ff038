//! Database operations for the order API.
//!
//! # Schema: `shop`
//!
//! ## Tables
//!
//! - `users` - Accounts with password hash and role
//! - `products` - Catalog entries with top-level stock
//! - `product_variants` - Per-variant price and stock, addressed by position
//! - `orders` - One row per gateway order, owned by a user
//! - `order_items` - Priced lines captured at order time
//! - `tower_sessions.session` - Session storage (owned by the session store)
//!
//! # Locking
//!
//! Capturing an order locks, in this order: the order row, product rows by
//! id, variant rows by `(product_id, position)`. Every writer that touches
//! stock follows the same order.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p emporium-cli -- migrate
//! ```

pub mod orders;
pub mod products;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::{CaptureOutcome, NewOrder, OrderRepository, OrderScope};
pub use products::{ProductRepository, ProductSeed, StockUpdate, VariantSeed};
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-violation into `Conflict`, everything else into `Database`.
fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
