//! Zone-based shipping rates.
//!
//! Shipping depends only on the first two characters of the destination
//! postal code: a fixed set of regional prefixes ships at a discounted rate,
//! everything else at a flat rate.

use std::collections::BTreeSet;

use rust_decimal::Decimal;

/// Prefixes that qualify for the regional rate by default.
pub const DEFAULT_DISCOUNTED_PREFIXES: [&str; 5] = ["40", "41", "42", "43", "44"];

/// Default regional rate, in the store currency's standard unit.
pub const DEFAULT_DISCOUNTED_RATE: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// Default rate for every other destination.
pub const DEFAULT_FLAT_RATE: Decimal = Decimal::from_parts(150, 0, 0, false, 0);

/// Shipping rate table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingPolicy {
    discounted_prefixes: BTreeSet<String>,
    discounted_rate: Decimal,
    flat_rate: Decimal,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_DISCOUNTED_PREFIXES,
            DEFAULT_DISCOUNTED_RATE,
            DEFAULT_FLAT_RATE,
        )
    }
}

impl ShippingPolicy {
    /// Build a policy. Prefixes are trimmed; blank entries are ignored.
    #[must_use]
    pub fn new<I, S>(discounted_prefixes: I, discounted_rate: Decimal, flat_rate: Decimal) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let discounted_prefixes = discounted_prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().to_owned())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            discounted_prefixes,
            discounted_rate,
            flat_rate,
        }
    }

    /// Shipping cost for a destination postal code.
    #[must_use]
    pub fn cost_for(&self, postal_code: &str) -> Decimal {
        if self.is_discounted(postal_code) {
            self.discounted_rate
        } else {
            self.flat_rate
        }
    }

    /// Whether the postal code falls in a discounted zone.
    #[must_use]
    pub fn is_discounted(&self, postal_code: &str) -> bool {
        postal_code
            .trim()
            .get(..2)
            .is_some_and(|prefix| self.discounted_prefixes.contains(prefix))
    }

    /// The regional rate.
    #[must_use]
    pub const fn discounted_rate(&self) -> Decimal {
        self.discounted_rate
    }

    /// The rate outside the discounted zones.
    #[must_use]
    pub const fn flat_rate(&self) -> Decimal {
        self.flat_rate
    }

    /// Discounted prefixes in sorted order.
    pub fn discounted_prefixes(&self) -> impl Iterator<Item = &str> {
        self.discounted_prefixes.iter().map(String::as_str)
    }
}
