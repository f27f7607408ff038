//! REST client for gateway order registration.

use std::collections::BTreeMap;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

use emporium_core::OrderId;

use super::GatewayError;
use crate::config::GatewayConfig;

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateGatewayOrder {
    /// Amount in the currency's smallest unit.
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
    /// Merchant reference, at most 40 characters.
    pub receipt: String,
    /// Free-form key/value annotations.
    pub notes: BTreeMap<String, String>,
}

/// Order as registered by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: OrderId,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Payment gateway REST client.
#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: Url,
    key_id: String,
    key_secret: SecretString,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("base_url", &self.base_url.as_str())
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    /// Create a client from configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        // `Url::join` replaces the last segment unless the path ends in '/'.
        let mut base_url = config.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            client: reqwest::Client::new(),
            base_url,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    /// Public key id, handed to clients for the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Register an order with the gateway.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Api` carrying the gateway's description when it
    /// rejects the order, `GatewayError::Http` on transport failure.
    #[instrument(skip(self, request), fields(amount = request.amount, currency = %request.currency))]
    pub async fn create_order(
        &self,
        request: &CreateGatewayOrder,
    ) -> Result<GatewayOrder, GatewayError> {
        let url = self.base_url.join("v1/orders")?;

        let response = self
            .client
            .post(url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let order: GatewayOrder = response
                .json()
                .await
                .map_err(|e| GatewayError::Parse(e.to_string()))?;
            debug!(gateway_order_id = %order.id, "Gateway order created");
            return Ok(order);
        }

        let body = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
            Ok(envelope) => (
                envelope.error.code.unwrap_or_else(|| "UNKNOWN".to_owned()),
                envelope
                    .error
                    .description
                    .unwrap_or_else(|| status.to_string()),
            ),
            Err(_) => ("UNKNOWN".to_owned(), status.to_string()),
        };

        warn!(status = status.as_u16(), code = %code, message = %message, "Gateway rejected order");

        Err(GatewayError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
