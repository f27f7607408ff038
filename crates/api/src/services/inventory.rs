//! Manual stock adjustment by store admins.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use emporium_core::ProductId;

use crate::db::{ProductRepository, RepositoryError, StockUpdate};
use crate::models::User;

/// Errors from stock adjustment.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Stock value outside `0..=i32::MAX`.
    #[error("invalid stock value: {0}")]
    InvalidStock(String),

    /// Caller is not an admin.
    #[error("admin role required")]
    Forbidden,

    /// Product has variants; the request must name one.
    #[error("product has variants; variant_index is required")]
    VariantRequired,

    /// Product has no variants; the request named one.
    #[error("product has no variants")]
    NoVariants,

    /// Variant index outside the product's variant list.
    #[error("variant index {index} out of range (product has {variant_count} variants)")]
    VariantOutOfRange { index: i64, variant_count: i64 },

    /// No product with this id.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Body of a stock update.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StockUpdateRequest {
    /// New absolute stock level.
    pub stock: i64,
    /// Variant to update; omit for simple products.
    #[serde(default)]
    pub variant_index: Option<i64>,
}

/// Stock level after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub variant_index: Option<i32>,
    pub stock: i32,
}

/// Stock adjustment service.
pub struct InventoryService<'a> {
    products: ProductRepository<'a>,
}

impl<'a> InventoryService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
        }
    }

    /// Overwrite the stock of a simple product or of one variant.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::Forbidden` for non-admins, `InvalidStock` for
    /// values outside `0..=i32::MAX`, the variant errors when the index does
    /// not fit the product, and `ProductNotFound` for unknown products.
    #[instrument(skip(self, actor), fields(admin_id = %actor.id))]
    pub async fn update_stock(
        &self,
        actor: &User,
        product_id: ProductId,
        request: StockUpdateRequest,
    ) -> Result<StockLevel, InventoryError> {
        if !actor.is_admin() {
            return Err(InventoryError::Forbidden);
        }

        let stock = validate_stock(request.stock)?;
        let variant_index = request
            .variant_index
            .map(|index| {
                i32::try_from(index).map_err(|_| InventoryError::VariantOutOfRange {
                    index,
                    variant_count: 0,
                })
            })
            .transpose()?;

        match self
            .products
            .update_stock(product_id, variant_index, stock)
            .await?
        {
            StockUpdate::Updated => {
                tracing::info!(
                    product_id = %product_id,
                    variant_index = ?variant_index,
                    stock,
                    "Stock updated"
                );
                Ok(StockLevel {
                    product_id,
                    variant_index,
                    stock,
                })
            }
            StockUpdate::ProductNotFound => Err(InventoryError::ProductNotFound(product_id)),
            StockUpdate::VariantRequired => Err(InventoryError::VariantRequired),
            StockUpdate::NoVariants => Err(InventoryError::NoVariants),
            StockUpdate::VariantOutOfRange { variant_count } => {
                Err(InventoryError::VariantOutOfRange {
                    index: request.variant_index.unwrap_or_default(),
                    variant_count,
                })
            }
        }
    }
}

fn validate_stock(stock: i64) -> Result<i32, InventoryError> {
    if stock < 0 {
        return Err(InventoryError::InvalidStock(
            "stock cannot be negative".to_owned(),
        ));
    }
    i32::try_from(stock)
        .map_err(|_| InventoryError::InvalidStock(format!("stock cannot exceed {}", i32::MAX)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stock_bounds() {
        assert_eq!(validate_stock(0).unwrap(), 0);
        assert_eq!(validate_stock(42).unwrap(), 42);
        assert_eq!(validate_stock(i64::from(i32::MAX)).unwrap(), i32::MAX);
        assert!(matches!(validate_stock(-1), Err(InventoryError::InvalidStock(_))));
        assert!(matches!(
            validate_stock(i64::from(i32::MAX) + 1),
            Err(InventoryError::InvalidStock(_))
        ));
    }

    #[test]
    fn test_request_rejects_fractional_stock() {
        let ok: StockUpdateRequest = serde_json::from_str(r#"{"stock": 5}"#).unwrap();
        assert_eq!(ok.stock, 5);
        assert_eq!(ok.variant_index, None);

        assert!(serde_json::from_str::<StockUpdateRequest>(r#"{"stock": 1.5}"#).is_err());
        assert!(serde_json::from_str::<StockUpdateRequest>(r#"{"stock": "5"}"#).is_err());
    }
}
