//! Catalog repository: products, variants, and manual stock writes.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use emporium_core::ProductId;

use super::RepositoryError;
use crate::models::product::{Product, ProductVariant};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    product_id: i32,
    position: i32,
    name: String,
    price: Decimal,
    stock: i32,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            index: row.position,
            name: row.name,
            price: row.price,
            stock: row.stock,
        }
    }
}

/// Attach variants (sorted by product, then position) to their products.
fn assemble(rows: Vec<ProductRow>, variants: Vec<VariantRow>) -> Vec<Product> {
    let mut by_product: HashMap<i32, Vec<ProductVariant>> = HashMap::new();
    for v in variants {
        by_product.entry(v.product_id).or_default().push(v.into());
    }

    rows.into_iter()
        .map(|row| Product {
            id: ProductId::new(row.id),
            variants: by_product.remove(&row.id).unwrap_or_default(),
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .collect()
}

// =============================================================================
// Stock Updates
// =============================================================================

/// Result of a manual stock write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
    /// The counter now holds the requested value.
    Updated,
    /// No product with this id.
    ProductNotFound,
    /// Product has variants; a variant index is required.
    VariantRequired,
    /// Index is not below the product's variant count.
    VariantOutOfRange { variant_count: i64 },
    /// Product has no variants; an index was given anyway.
    NoVariants,
}

/// A product definition as loaded from a seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<VariantSeed>,
}

/// A variant definition as loaded from a seed file. Index is list position.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSeed {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every product with its variants, by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, created_at, updated_at
            FROM shop.products
            ORDER BY id
            ",
        )
        .fetch_all(self.pool)
        .await?;

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT product_id, position, name, price, stock
            FROM shop.product_variants
            ORDER BY product_id, position
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(assemble(rows, variants))
    }

    /// Get one product with its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_many(&[id]).await?.remove(&id))
    }

    /// Get several products with their variants, keyed by id.
    ///
    /// Ids without a product are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_many(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();

        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT id, name, description, price, stock, created_at, updated_at
            FROM shop.products
            WHERE id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let variants = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT product_id, position, name, price, stock
            FROM shop.product_variants
            WHERE product_id = ANY($1)
            ORDER BY product_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(assemble(rows, variants)
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    /// Overwrite one stock counter.
    ///
    /// Locks the product row first, then the variant row, matching the lock
    /// order used when orders are captured.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails. Shape mismatches
    /// are reported through [`StockUpdate`], not as errors.
    pub async fn update_stock(
        &self,
        id: ProductId,
        variant_index: Option<i32>,
        stock: i32,
    ) -> Result<StockUpdate, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT id FROM shop.products WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(StockUpdate::ProductNotFound);
        }

        let variant_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM shop.product_variants WHERE product_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let outcome = match variant_index {
            None if variant_count > 0 => StockUpdate::VariantRequired,
            None => {
                sqlx::query(
                    "UPDATE shop.products SET stock = $2, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .bind(stock)
                .execute(&mut *tx)
                .await?;
                StockUpdate::Updated
            }
            Some(_) if variant_count == 0 => StockUpdate::NoVariants,
            Some(index) if index < 0 || i64::from(index) >= variant_count => {
                StockUpdate::VariantOutOfRange { variant_count }
            }
            Some(index) => {
                let updated = sqlx::query(
                    r"
                    UPDATE shop.product_variants SET stock = $3
                    WHERE product_id = $1 AND position = $2
                    ",
                )
                .bind(id)
                .bind(index)
                .bind(stock)
                .execute(&mut *tx)
                .await?
                .rows_affected();

                // Positions are not guaranteed contiguous; a gap is out of range.
                if updated == 1 {
                    sqlx::query("UPDATE shop.products SET updated_at = NOW() WHERE id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    StockUpdate::Updated
                } else {
                    StockUpdate::VariantOutOfRange { variant_count }
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Insert or replace a product and its variants from seed data.
    ///
    /// Variants past the end of the seed's list are removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn upsert_seed(&self, seed: &ProductSeed) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO shop.products (id, name, description, price, stock)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                stock = EXCLUDED.stock,
                updated_at = NOW()
            ",
        )
        .bind(seed.id)
        .bind(&seed.name)
        .bind(&seed.description)
        .bind(seed.price)
        .bind(seed.stock)
        .execute(&mut *tx)
        .await?;

        let count = i32::try_from(seed.variants.len()).map_err(|_| {
            RepositoryError::Conflict(format!("product {} has too many variants", seed.id))
        })?;

        sqlx::query("DELETE FROM shop.product_variants WHERE product_id = $1 AND position >= $2")
            .bind(seed.id)
            .bind(count)
            .execute(&mut *tx)
            .await?;

        for (position, variant) in (0..count).zip(&seed.variants) {
            sqlx::query(
                r"
                INSERT INTO shop.product_variants (product_id, position, name, price, stock)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product_id, position) DO UPDATE
                SET name = EXCLUDED.name,
                    price = EXCLUDED.price,
                    stock = EXCLUDED.stock
                ",
            )
            .bind(seed.id)
            .bind(position)
            .bind(&variant.name)
            .bind(variant.price)
            .bind(variant.stock)
            .execute(&mut *tx)
            .await?;
        }

        // Explicit ids bypass the sequence.
        sqlx::query(
            r"
            SELECT setval(
                pg_get_serial_sequence('shop.products', 'id'),
                (SELECT MAX(id) FROM shop.products)
            )
            ",
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
