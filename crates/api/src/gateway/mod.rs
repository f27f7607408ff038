//! Payment gateway integration.
//!
//! Two halves:
//!
//! - [`GatewayClient`] registers orders with the gateway's REST API before
//!   the customer pays (`POST /v1/orders`, HTTP basic auth with the key id
//!   and secret).
//! - [`SignatureVerifier`] checks the signature the gateway's checkout widget
//!   hands back after payment: lowercase hex of
//!   `HMAC-SHA256(secret, "{order_id}|{payment_id}")`.
//!
//! No retries and no custom timeouts: a failed call fails the request.

mod client;
mod signature;

pub use client::{CreateGatewayOrder, GatewayClient, GatewayOrder};
pub use signature::{SignatureError, SignatureVerifier};

use thiserror::Error;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway rejected the request.
    #[error("gateway error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Base URL could not be joined with an endpoint path.
    #[error("invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),
}

impl GatewayError {
    /// Message suitable for the API caller.
    ///
    /// Gateway-reported descriptions are passed through; transport details
    /// are not.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Api { message, .. } => format!("payment gateway error: {message}"),
            Self::Http(_) | Self::Parse(_) | Self::Url(_) => {
                "payment gateway unavailable".to_owned()
            }
        }
    }
}
