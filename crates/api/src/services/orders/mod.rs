//! Order lifecycle: creation, payment verification, and reads.
//!
//! ```text
//! create_order ──▶ price from catalog ──▶ gateway order ──▶ persist (created)
//! verify_payment ──▶ HMAC check ──▶ ownership ──▶ capture transaction
//!                                                   ├─▶ captured (+ email)
//!                                                   └─▶ failed_out_of_stock
//! ```

mod error;

pub use error::OrderError;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use emporium_core::order::{OrderTotals, validate_items};
use emporium_core::{
    CurrencyCode, CustomerInfo, LineItemRequest, OrderId, OrderStatus, PaymentId, Price,
    PricedLine, ProductId,
};

use crate::db::{CaptureOutcome, NewOrder, OrderRepository, OrderScope, ProductRepository};
use crate::gateway::CreateGatewayOrder;
use crate::models::product::{Product, VariantSelectionError};
use crate::models::{Order, User};
use crate::state::AppState;

/// Largest page size for order listings.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Body of a create-order request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<LineItemRequest>,
    pub customer: CustomerInfo,
}

/// What the client needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub order_id: OrderId,
    pub currency: CurrencyCode,
    /// Amount in the smallest currency unit.
    pub amount: i64,
    /// Public gateway key for the checkout widget.
    pub key_id: String,
}

/// Body of a payment verification request.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub signature: String,
}

/// Result of payment verification.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedPayment {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Order lifecycle service.
pub struct OrderService<'a> {
    state: &'a AppState,
    orders: OrderRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub fn new(state: &'a AppState) -> Self {
        Self {
            state,
            orders: OrderRepository::new(state.pool()),
            products: ProductRepository::new(state.pool()),
        }
    }

    /// Price a cart, register it with the gateway, and persist it.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed carts or customer details
    /// - `ProductNotFound` / `VariantNotFound` for unknown catalog entries
    /// - `VariantRequired` / `NoVariants` when the index does not fit the product
    /// - `GatewayNotConfigured` / `Gateway` when the gateway cannot be used
    #[instrument(skip(self, user, request), fields(user_id = %user.id, lines = request.items.len()))]
    pub async fn create_order(
        &self,
        user: &User,
        request: CreateOrderRequest,
    ) -> Result<CreatedOrder, OrderError> {
        validate_items(&request.items)?;
        request.customer.validate()?;

        let ids: Vec<ProductId> = request
            .items
            .iter()
            .map(|i| i.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let catalog = self.products.get_many(&ids).await?;
        let lines = price_lines(&request.items, &catalog)?;

        let config = self.state.config();
        let shipping = config.shipping.cost_for(&request.customer.postal_code);
        let totals = OrderTotals::compute(&lines, shipping);
        let currency = config.currency;
        let amount = Price::new(totals.total, currency).to_minor_units()?;

        let gateway = self.state.gateway().ok_or(OrderError::GatewayNotConfigured)?;
        let gateway_order = gateway
            .create_order(&CreateGatewayOrder {
                amount,
                currency: currency.code().to_owned(),
                receipt: format!("rcpt_{}", Uuid::new_v4().simple()),
                notes: BTreeMap::from([("user_id".to_owned(), user.id.to_string())]),
            })
            .await?;

        let order = self
            .orders
            .insert(NewOrder {
                id: &gateway_order.id,
                user_id: user.id,
                customer: &request.customer,
                currency,
                totals,
                amount_minor: amount,
                lines: &lines,
            })
            .await?;

        tracing::info!(
            order_id = %order.id,
            total = %order.total_price(),
            "Order created"
        );

        Ok(CreatedOrder {
            order_id: order.id,
            currency,
            amount,
            key_id: gateway.key_id().to_owned(),
        })
    }

    /// Verify a payment signature and capture the order.
    ///
    /// The signature is checked before any order state is read. Replays of
    /// an already-settled order return its current status unchanged.
    ///
    /// # Errors
    ///
    /// - `SignatureNotConfigured` when no signature secret is set
    /// - `InvalidSignature` when the signature does not match
    /// - `OrderNotFound` / `Forbidden` for unknown or foreign orders
    #[instrument(
        skip(self, user, request),
        fields(user_id = %user.id, order_id = %request.order_id, payment_id = %request.payment_id)
    )]
    pub async fn verify_payment(
        &self,
        user: &User,
        request: VerifyPaymentRequest,
    ) -> Result<VerifiedPayment, OrderError> {
        let verifier = self
            .state
            .signatures()
            .ok_or(OrderError::SignatureNotConfigured)?;

        if let Err(err) = verifier.verify(&request.order_id, &request.payment_id, &request.signature)
        {
            tracing::warn!(
                target: "security",
                user_id = %user.id,
                order_id = %request.order_id,
                payment_id = %request.payment_id,
                "Payment signature verification failed"
            );
            return Err(err.into());
        }

        let order = self
            .orders
            .get(&request.order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(request.order_id.clone()))?;
        authorize(user, &order)?;

        let order = match self
            .orders
            .capture(&request.order_id, &request.payment_id)
            .await?
        {
            CaptureOutcome::Captured(order) => {
                tracing::info!(order_id = %order.id, "Order captured");
                self.send_confirmation(&order).await;
                order
            }
            CaptureOutcome::OutOfStock { order, shortfalls } => {
                for s in &shortfalls {
                    tracing::warn!(
                        order_id = %order.id,
                        stock = %s.key,
                        requested = s.requested,
                        available = s.available,
                        "Insufficient stock at capture"
                    );
                }
                order
            }
            CaptureOutcome::AlreadyCaptured(order) | CaptureOutcome::AlreadyFailed(order) => {
                tracing::info!(order_id = %order.id, status = %order.status, "Order already settled");
                order
            }
            CaptureOutcome::NotFound => {
                return Err(OrderError::OrderNotFound(request.order_id));
            }
        };

        Ok(VerifiedPayment {
            order_id: order.id,
            status: order.status,
        })
    }

    /// Get one order visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns `OrderNotFound` or `Forbidden`.
    pub async fn get(&self, user: &User, id: &OrderId) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get(id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(id.clone()))?;
        authorize(user, &order)?;
        Ok(order)
    }

    /// List orders visible to the caller, newest first.
    ///
    /// Admins see every order; customers see their own.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the query fails.
    pub async fn list(
        &self,
        user: &User,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Order>, OrderError> {
        let scope = if user.is_admin() {
            OrderScope::All
        } else {
            OrderScope::Owner(user.id)
        };
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        Ok(self.orders.list(scope, limit, offset).await?)
    }

    /// Best-effort confirmation email.
    async fn send_confirmation(&self, order: &Order) {
        let Some(email) = self.state.email() else {
            tracing::info!(order_id = %order.id, "Email not configured; skipping confirmation");
            return;
        };

        if let Err(e) = email.send_order_confirmation(order).await {
            tracing::error!(order_id = %order.id, error = %e, "Failed to send order confirmation");
        }
    }
}

/// Owner or admin may act on an order.
fn authorize(user: &User, order: &Order) -> Result<(), OrderError> {
    if order.is_owned_by(user.id) || user.is_admin() {
        Ok(())
    } else {
        Err(OrderError::Forbidden)
    }
}

/// Attach current catalog prices to requested lines.
fn price_lines(
    items: &[LineItemRequest],
    catalog: &HashMap<ProductId, Product>,
) -> Result<Vec<PricedLine>, OrderError> {
    items
        .iter()
        .map(|item| {
            let product = catalog
                .get(&item.product_id)
                .ok_or(OrderError::ProductNotFound(item.product_id))?;

            let (product_name, unit_price) =
                product.select(item.variant_index).map_err(|e| match e {
                    VariantSelectionError::VariantRequired => {
                        OrderError::VariantRequired(item.product_id)
                    }
                    VariantSelectionError::NoVariants => OrderError::NoVariants(item.product_id),
                    VariantSelectionError::UnknownVariant(index) => OrderError::VariantNotFound {
                        product_id: item.product_id,
                        index,
                    },
                })?;

            Ok(PricedLine {
                product_id: item.product_id,
                variant_index: item.variant_index,
                product_name,
                quantity: item.quantity,
                unit_price,
            })
        })
        .collect()
}
