//! Money amounts with decimal arithmetic.
//!
//! Catalog prices, order totals and shipping are carried as [`Decimal`] in
//! the currency's standard unit (rupees, dollars). The payment gateway wants
//! integers in the smallest unit (paise, cents); [`Price::to_minor_units`]
//! is the one place that conversion happens.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors converting an amount for the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// Amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount does not fit the gateway's integer representation.
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., rupees, not paise).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Amount in the smallest currency unit, rounded half away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] for negative amounts and
    /// [`PriceError::OutOfRange`] if the result does not fit in `i64`.
    pub fn to_minor_units(&self) -> Result<i64, PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }

        let scale = Decimal::from(self.currency_code.minor_unit_factor());
        self.amount
            .checked_mul(scale)
            .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|v| v.to_i64())
            .ok_or(PriceError::OutOfRange(self.amount))
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{:.2}",
            self.currency_code.symbol(),
            self.amount.round_dp(2)
        )
    }
}

/// ISO 4217 currency codes accepted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    INR,
    USD,
    EUR,
    GBP,
}

impl CurrencyCode {
    /// Three-letter code sent to the gateway.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }

    /// Number of minor units in one standard unit.
    #[must_use]
    pub const fn minor_unit_factor(self) -> i64 {
        // All supported currencies have two decimal places.
        100
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INR" => Ok(Self::INR),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn inr(amount: Decimal) -> Price {
        Price::new(amount, CurrencyCode::INR)
    }

    #[test]
    fn test_minor_units_whole_amount() {
        assert_eq!(inr(Decimal::from(1080)).to_minor_units().unwrap(), 108_000);
    }

    #[test]
    fn test_minor_units_rounds_half_away_from_zero() {
        // 10.005 rupees -> 1000.5 paise -> 1001
        assert_eq!(inr(Decimal::new(10_005, 3)).to_minor_units().unwrap(), 1001);
        assert_eq!(inr(Decimal::new(10_004, 3)).to_minor_units().unwrap(), 1000);
    }

    #[test]
    fn test_minor_units_zero() {
        assert_eq!(inr(Decimal::ZERO).to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_minor_units_negative_rejected() {
        assert!(matches!(
            inr(Decimal::new(-1, 0)).to_minor_units(),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_minor_units_overflow_rejected() {
        assert!(matches!(
            inr(Decimal::MAX).to_minor_units(),
            Err(PriceError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(inr(Decimal::new(108_000, 2)).to_string(), "₹1080.00");
        assert_eq!(
            Price::new(Decimal::new(1999, 2), CurrencyCode::USD).to_string(),
            "$19.99"
        );
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("inr".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert!("JPY".parse::<CurrencyCode>().is_err());
    }
}
