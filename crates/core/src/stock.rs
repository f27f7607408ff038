//! All-or-nothing stock deduction planning.
//!
//! Capturing an order reads the current level of every stock row it draws
//! from and asks [`plan_deductions`] what to write. Either every row can
//! cover its demand and the plan lists one deduction per row, or nothing is
//! deducted and the caller gets the full list of shortfalls.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProductId;

/// Identifies one stock counter: a simple product's own stock, or one
/// variant entry of a variable product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub variant_index: Option<i32>,
}

impl StockKey {
    #[must_use]
    pub const fn new(product_id: ProductId, variant_index: Option<i32>) -> Self {
        Self {
            product_id,
            variant_index,
        }
    }

    #[must_use]
    pub const fn product(product_id: ProductId) -> Self {
        Self::new(product_id, None)
    }

    #[must_use]
    pub const fn variant(product_id: ProductId, index: i32) -> Self {
        Self::new(product_id, Some(index))
    }
}

impl std::fmt::Display for StockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variant_index {
            Some(index) => write!(f, "product {} variant {}", self.product_id, index),
            None => write!(f, "product {}", self.product_id),
        }
    }
}

/// Units to remove from one stock counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub key: StockKey,
    pub quantity: i32,
}

/// A counter that cannot cover its demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub key: StockKey,
    pub requested: i64,
    pub available: i32,
}

/// Outcome of a plan that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("insufficient stock for {} item(s)", .0.len())]
    Insufficient(Vec<Shortfall>),
}

/// Sum requested quantities per stock counter.
///
/// Returned in key order, which is also the order rows must be locked in.
pub fn aggregate_demand<I>(lines: I) -> BTreeMap<StockKey, i64>
where
    I: IntoIterator<Item = (StockKey, i32)>,
{
    let mut demand = BTreeMap::new();
    for (key, quantity) in lines {
        *demand.entry(key).or_insert(0_i64) += i64::from(quantity);
    }
    demand
}

/// Decide the deductions for a demand against current levels.
///
/// Counters missing from `available` (deleted product or variant) are
/// treated as empty.
///
/// # Errors
///
/// Returns [`StockError::Insufficient`] listing every short counter; in that
/// case no deduction may be applied.
pub fn plan_deductions(
    demand: &BTreeMap<StockKey, i64>,
    available: &HashMap<StockKey, i32>,
) -> Result<Vec<Deduction>, StockError> {
    let mut deductions = Vec::with_capacity(demand.len());
    let mut shortfalls = Vec::new();

    for (&key, &requested) in demand {
        let on_hand = available.get(&key).copied().unwrap_or(0);
        match i32::try_from(requested) {
            Ok(quantity) if quantity <= on_hand => deductions.push(Deduction { key, quantity }),
            _ => shortfalls.push(Shortfall {
                key,
                requested,
                available: on_hand,
            }),
        }
    }

    if shortfalls.is_empty() {
        Ok(deductions)
    } else {
        Err(StockError::Insufficient(shortfalls))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn key(product: i32) -> StockKey {
        StockKey::product(ProductId::new(product))
    }

    #[test]
    fn test_requested_above_stock_is_rejected_whole() {
        // stock 3, requested 5
        let demand = aggregate_demand([(key(1), 5)]);
        let available = HashMap::from([(key(1), 3)]);

        let err = plan_deductions(&demand, &available).unwrap_err();
        assert_eq!(
            err,
            StockError::Insufficient(vec![Shortfall {
                key: key(1),
                requested: 5,
                available: 3,
            }])
        );
    }

    #[test]
    fn test_one_short_line_blocks_all_deductions() {
        let demand = aggregate_demand([(key(1), 1), (key(2), 4), (key(3), 1)]);
        let available = HashMap::from([(key(1), 10), (key(2), 3), (key(3), 10)]);

        let StockError::Insufficient(shortfalls) =
            plan_deductions(&demand, &available).unwrap_err();
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].key, key(2));
    }

    #[test]
    fn test_exact_stock_is_enough() {
        let demand = aggregate_demand([(key(7), 3)]);
        let available = HashMap::from([(key(7), 3)]);
        assert_eq!(
            plan_deductions(&demand, &available).unwrap(),
            vec![Deduction {
                key: key(7),
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_repeated_lines_are_aggregated() {
        let demand = aggregate_demand([(key(1), 2), (key(1), 2)]);
        assert_eq!(demand.get(&key(1)), Some(&4));

        let available = HashMap::from([(key(1), 3)]);
        assert!(plan_deductions(&demand, &available).is_err());
    }

    #[test]
    fn test_variants_are_separate_counters() {
        let product = ProductId::new(5);
        let small = StockKey::variant(product, 0);
        let large = StockKey::variant(product, 1);

        let demand = aggregate_demand([(small, 2), (large, 1)]);
        let available = HashMap::from([(small, 2), (large, 0)]);

        let StockError::Insufficient(shortfalls) =
            plan_deductions(&demand, &available).unwrap_err();
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].key, large);
    }

    #[test]
    fn test_missing_counter_counts_as_empty() {
        let demand = aggregate_demand([(key(99), 1)]);
        let err = plan_deductions(&demand, &HashMap::new()).unwrap_err();
        assert!(matches!(err, StockError::Insufficient(ref s) if s[0].available == 0));
    }

    #[test]
    fn test_demand_is_in_lock_order() {
        let demand = aggregate_demand([
            (key(3), 1),
            (StockKey::variant(ProductId::new(1), 2), 1),
            (key(1), 1),
            (StockKey::variant(ProductId::new(1), 0), 1),
        ]);
        let keys: Vec<_> = demand.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                key(1),
                StockKey::variant(ProductId::new(1), 0),
                StockKey::variant(ProductId::new(1), 2),
                key(3),
            ]
        );
    }
}
