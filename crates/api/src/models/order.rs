//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::{
    CurrencyCode, CustomerInfo, OrderId, OrderStatus, OrderTotals, PaymentId, Price, ProductId,
    UserId,
};

/// A persisted order.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Gateway-assigned order id.
    pub id: OrderId,
    /// Owner.
    pub user_id: UserId,
    /// Shipping and contact snapshot.
    pub customer: CustomerInfo,
    pub currency: CurrencyCode,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Total in the currency's smallest unit, as charged.
    pub amount_minor: i64,
    pub status: OrderStatus,
    /// Set exactly when the order is captured.
    pub payment_id: Option<PaymentId>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub captured_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A priced line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub line_number: i32,
    pub product_id: ProductId,
    pub variant_index: Option<i32>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

impl Order {
    /// Money breakdown as stored.
    #[must_use]
    pub const fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            shipping: self.shipping,
            total: self.total,
        }
    }

    /// Total as a display price.
    #[must_use]
    pub const fn total_price(&self) -> Price {
        Price::new(self.total, self.currency)
    }

    /// Whether `user_id` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }
}
