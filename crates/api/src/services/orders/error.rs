//! Order service error types.

use thiserror::Error;

use emporium_core::{OrderId, OrderValidationError, PriceError, ProductId};

use crate::db::RepositoryError;
use crate::gateway::{GatewayError, SignatureError};

/// Errors from creating, verifying, or reading orders.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Request failed validation.
    #[error(transparent)]
    Validation(#[from] OrderValidationError),

    /// Line refers to a product that does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Line refers to a variant the product does not have.
    #[error("product {product_id} has no variant {index}")]
    VariantNotFound { product_id: ProductId, index: i32 },

    /// Variable product ordered without choosing a variant.
    #[error("product {0} requires a variant index")]
    VariantRequired(ProductId),

    /// Simple product ordered with a variant index.
    #[error("product {0} has no variants")]
    NoVariants(ProductId),

    /// Total cannot be charged.
    #[error("invalid order amount: {0}")]
    Amount(#[from] PriceError),

    /// No order with this id.
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// Caller neither owns the order nor is an admin.
    #[error("not allowed to access this order")]
    Forbidden,

    /// Payment signature check failed.
    #[error("invalid payment signature")]
    InvalidSignature(#[from] SignatureError),

    /// Gateway credentials are not configured.
    #[error("payment gateway is not configured")]
    GatewayNotConfigured,

    /// Signature secret is not configured.
    #[error("payment signature secret is not configured")]
    SignatureNotConfigured,

    /// Gateway call failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
