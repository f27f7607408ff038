//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use emporium_core::ProductId;

/// A catalog product.
///
/// A product is either simple (no variants, stock on the product) or
/// variable (one stock counter per variant, product stock unused).
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Price of a simple product. Variants carry their own price.
    pub price: Decimal,
    /// Stock of a simple product.
    pub stock: i32,
    /// Variants in index order.
    pub variants: Vec<ProductVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One purchasable option of a variable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductVariant {
    /// Zero-based index clients use to address the variant.
    pub index: i32,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
}

/// Why a product/variant pair cannot be priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantSelectionError {
    /// Variable product ordered without a variant index.
    VariantRequired,
    /// Simple product ordered with a variant index.
    NoVariants,
    /// Index past the end of the variant list.
    UnknownVariant(i32),
}

impl Product {
    /// Whether stock and price live on variants.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Look up a variant by index.
    #[must_use]
    pub fn variant(&self, index: i32) -> Option<&ProductVariant> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.variants.get(i))
    }

    /// Resolve the display name and current unit price for a line.
    ///
    /// # Errors
    ///
    /// Returns a [`VariantSelectionError`] when the variant index does not
    /// fit the product's shape.
    pub fn select(&self, variant_index: Option<i32>) -> Result<(String, Decimal), VariantSelectionError> {
        match (variant_index, self.is_variable()) {
            (None, false) => Ok((self.name.clone(), self.price)),
            (None, true) => Err(VariantSelectionError::VariantRequired),
            (Some(_), false) => Err(VariantSelectionError::NoVariants),
            (Some(index), true) => self
                .variant(index)
                .map(|v| (format!("{} - {}", self.name, v.name), v.price))
                .ok_or(VariantSelectionError::UnknownVariant(index)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(variants: Vec<ProductVariant>) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Cotton Tee".to_owned(),
            description: String::new(),
            price: Decimal::from(500),
            stock: 4,
            variants,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn variant(index: i32, name: &str, price: i64) -> ProductVariant {
        ProductVariant {
            index,
            name: name.to_owned(),
            price: Decimal::from(price),
            stock: 1,
        }
    }

    #[test]
    fn test_simple_product_uses_own_price() {
        let p = product(vec![]);
        assert_eq!(p.select(None).unwrap(), ("Cotton Tee".to_owned(), Decimal::from(500)));
        assert_eq!(p.select(Some(0)), Err(VariantSelectionError::NoVariants));
    }

    #[test]
    fn test_variable_product_uses_variant_price() {
        let p = product(vec![variant(0, "S", 450), variant(1, "XL", 550)]);
        assert_eq!(
            p.select(Some(1)).unwrap(),
            ("Cotton Tee - XL".to_owned(), Decimal::from(550))
        );
        assert_eq!(p.select(None), Err(VariantSelectionError::VariantRequired));
        assert_eq!(p.select(Some(2)), Err(VariantSelectionError::UnknownVariant(2)));
        assert_eq!(p.select(Some(-1)), Err(VariantSelectionError::UnknownVariant(-1)));
    }
}
