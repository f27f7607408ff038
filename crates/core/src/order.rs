//! Order request validation and pricing arithmetic.
//!
//! Prices never come from the client: a [`LineItemRequest`] names only what
//! and how many, and becomes a [`PricedLine`] once the server has read the
//! current catalog price.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stock::StockKey;
use crate::types::{Email, ProductId};

/// Upper bound on units of a single line.
pub const MAX_QUANTITY_PER_LINE: i32 = 1000;

/// Upper bound on lines in a single order.
pub const MAX_LINES_PER_ORDER: usize = 100;

/// Why an order request was rejected before touching the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("order must contain at least one item")]
    NoItems,

    #[error("order cannot contain more than {} items", MAX_LINES_PER_ORDER)]
    TooManyItems,

    #[error("item {line}: quantity must be between 1 and {}", MAX_QUANTITY_PER_LINE)]
    InvalidQuantity { line: usize },

    #[error("item {line}: variant index cannot be negative")]
    InvalidVariantIndex { line: usize },

    #[error("customer {0} is required")]
    MissingField(&'static str),

    #[error("postal code must be 2-10 digits")]
    InvalidPostalCode,
}

/// One cart line as submitted by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub variant_index: Option<i32>,
    pub quantity: i32,
}

impl LineItemRequest {
    /// The stock row this line draws from.
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_index)
    }
}

/// Shipping and contact details captured on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Email,
    pub phone: String,
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl CustomerInfo {
    /// Check required fields and the postal code format.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        let required = [
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address_line1),
            ("city", &self.city),
            ("state", &self.state),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderValidationError::MissingField(field));
            }
        }

        let postal = self.postal_code.trim();
        if !(2..=10).contains(&postal.len()) || !postal.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OrderValidationError::InvalidPostalCode);
        }

        Ok(())
    }
}

/// Validate a submitted cart before any price lookup.
///
/// # Errors
///
/// Returns the first invalid line, or an error for empty/oversized carts.
pub fn validate_items(items: &[LineItemRequest]) -> Result<(), OrderValidationError> {
    if items.is_empty() {
        return Err(OrderValidationError::NoItems);
    }
    if items.len() > MAX_LINES_PER_ORDER {
        return Err(OrderValidationError::TooManyItems);
    }

    for (line, item) in items.iter().enumerate() {
        if !(1..=MAX_QUANTITY_PER_LINE).contains(&item.quantity) {
            return Err(OrderValidationError::InvalidQuantity { line });
        }
        if item.variant_index.is_some_and(|i| i < 0) {
            return Err(OrderValidationError::InvalidVariantIndex { line });
        }
    }

    Ok(())
}

/// A line priced from the catalog at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub variant_index: Option<i32>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PricedLine {
    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// The stock row this line draws from.
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_index)
    }
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Sum the lines and add shipping.
    #[must_use]
    pub fn compute(lines: &[PricedLine], shipping: Decimal) -> Self {
        let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
        Self {
            subtotal,
            shipping,
            total: subtotal + shipping,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shipping::ShippingPolicy;

    fn customer(postal_code: &str) -> CustomerInfo {
        CustomerInfo {
            name: "Asha Patil".to_owned(),
            email: Email::parse("asha@example.in").unwrap(),
            phone: "+91 98200 00000".to_owned(),
            address_line1: "12 Lake Road".to_owned(),
            address_line2: None,
            city: "Pune".to_owned(),
            state: "MH".to_owned(),
            postal_code: postal_code.to_owned(),
        }
    }

    fn line(product: i32, quantity: i32, price: i64) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(product),
            variant_index: None,
            product_name: format!("product-{product}"),
            quantity,
            unit_price: Decimal::from(price),
        }
    }

    #[test]
    fn test_totals_example_regional_order() {
        let policy = ShippingPolicy::default();
        let customer = customer("411001");
        let lines = [line(1, 2, 500)];

        let totals = OrderTotals::compute(&lines, policy.cost_for(&customer.postal_code));

        assert_eq!(totals.subtotal, Decimal::from(1000));
        assert_eq!(totals.shipping, Decimal::from(80));
        assert_eq!(totals.total, Decimal::from(1080));
    }

    #[test]
    fn test_totals_sum_every_line() {
        let lines = [line(1, 3, 250), line(2, 1, 1999), line(3, 10, 5)];
        let totals = OrderTotals::compute(&lines, Decimal::from(150));
        assert_eq!(totals.subtotal, Decimal::from(750 + 1999 + 50));
        assert_eq!(totals.total, totals.subtotal + Decimal::from(150));
    }

    #[test]
    fn test_totals_keep_fractional_prices() {
        let mut fractional = line(1, 3, 0);
        fractional.unit_price = Decimal::new(3333, 2);
        let totals = OrderTotals::compute(&[fractional], Decimal::ZERO);
        assert_eq!(totals.subtotal, Decimal::new(9999, 2));
    }

    #[test]
    fn test_validate_items() {
        let ok = LineItemRequest {
            product_id: ProductId::new(1),
            variant_index: Some(0),
            quantity: 2,
        };
        assert!(validate_items(&[ok]).is_ok());
        assert_eq!(validate_items(&[]), Err(OrderValidationError::NoItems));

        let zero = LineItemRequest { quantity: 0, ..ok };
        assert_eq!(
            validate_items(&[ok, zero]),
            Err(OrderValidationError::InvalidQuantity { line: 1 })
        );

        let huge = LineItemRequest {
            quantity: MAX_QUANTITY_PER_LINE + 1,
            ..ok
        };
        assert!(validate_items(&[huge]).is_err());

        let negative_variant = LineItemRequest {
            variant_index: Some(-1),
            ..ok
        };
        assert_eq!(
            validate_items(&[negative_variant]),
            Err(OrderValidationError::InvalidVariantIndex { line: 0 })
        );

        let too_many = vec![ok; MAX_LINES_PER_ORDER + 1];
        assert_eq!(
            validate_items(&too_many),
            Err(OrderValidationError::TooManyItems)
        );
    }

    #[test]
    fn test_validate_customer() {
        assert!(customer("411001").validate().is_ok());

        let mut blank_city = customer("411001");
        blank_city.city = "  ".to_owned();
        assert_eq!(
            blank_city.validate(),
            Err(OrderValidationError::MissingField("city"))
        );

        for bad in ["", "4", "41100A", "12345678901"] {
            assert_eq!(
                customer(bad).validate(),
                Err(OrderValidationError::InvalidPostalCode),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_customer_json_rejects_bad_email() {
        let json = serde_json::json!({
            "name": "A",
            "email": "nope",
            "phone": "1",
            "address_line1": "x",
            "city": "y",
            "state": "z",
            "postal_code": "411001"
        });
        assert!(serde_json::from_value::<CustomerInfo>(json).is_err());
    }
}
