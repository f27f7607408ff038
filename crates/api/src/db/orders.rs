//! Order repository: persistence, role-scoped reads, and the capture
//! transaction that commits stock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use emporium_core::stock::{Shortfall, StockError, aggregate_demand, plan_deductions};
use emporium_core::{
    CurrencyCode, CustomerInfo, OrderId, OrderStatus, OrderTotals, PaymentId, PricedLine,
    ProductId, StockKey, UserId,
};

use super::RepositoryError;
use crate::models::order::{Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, customer, currency, subtotal, shipping, total, \
     amount_minor, status, payment_id, created_at, captured_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: i32,
    customer: serde_json::Value,
    currency: String,
    subtotal: Decimal,
    shipping: Decimal,
    total: Decimal,
    amount_minor: i64,
    status: OrderStatus,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    captured_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    order_id: String,
    line_number: i32,
    product_id: i32,
    variant_position: Option<i32>,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            line_number: row.line_number,
            product_id: ProductId::new(row.product_id),
            variant_index: row.variant_position,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let customer: CustomerInfo = serde_json::from_value(self.customer).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid customer in order {}: {e}", self.id))
        })?;
        let currency: CurrencyCode = self.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in order {}: {e}", self.id))
        })?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            customer,
            currency,
            subtotal: self.subtotal,
            shipping: self.shipping,
            total: self.total,
            amount_minor: self.amount_minor,
            status: self.status,
            payment_id: self.payment_id.map(PaymentId::new),
            items,
            created_at: self.created_at,
            captured_at: self.captured_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductStockRow {
    id: i32,
    stock: i32,
}

#[derive(Debug, sqlx::FromRow)]
struct VariantStockRow {
    product_id: i32,
    position: i32,
    stock: i32,
}

// =============================================================================
// Public Types
// =============================================================================

/// Everything needed to persist a freshly created order.
#[derive(Debug)]
pub struct NewOrder<'a> {
    pub id: &'a OrderId,
    pub user_id: UserId,
    pub customer: &'a CustomerInfo,
    pub currency: CurrencyCode,
    pub totals: OrderTotals,
    pub amount_minor: i64,
    pub lines: &'a [PricedLine],
}

/// Which orders a read may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Only orders owned by this user.
    Owner(UserId),
    /// Every order.
    All,
}

/// Result of the capture transaction.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Stock deducted and order captured by this call.
    Captured(Order),
    /// Order had already been captured; nothing changed.
    AlreadyCaptured(Order),
    /// Stock could not cover the order; it is now `failed_out_of_stock`
    /// and no stock was touched.
    OutOfStock {
        order: Order,
        shortfalls: Vec<Shortfall>,
    },
    /// Order had already failed for stock; nothing changed.
    AlreadyFailed(Order),
    /// No order with this id.
    NotFound,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order and its lines in one transaction, status `created`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order id already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, new), fields(order_id = %new.id))]
    pub async fn insert(&self, new: NewOrder<'_>) -> Result<Order, RepositoryError> {
        let customer = serde_json::to_value(new.customer)
            .map_err(|e| RepositoryError::DataCorruption(format!("customer encoding: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.orders
                (id, user_id, customer, currency, subtotal, shipping, total, amount_minor)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new.id)
        .bind(new.user_id)
        .bind(customer)
        .bind(new.currency.code())
        .bind(new.totals.subtotal)
        .bind(new.totals.shipping)
        .bind(new.totals.total)
        .bind(new.amount_minor)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| super::conflict_on_unique(e, "order"))?;

        let mut items = Vec::with_capacity(new.lines.len());
        for (line_number, line) in (0_i32..).zip(new.lines) {
            sqlx::query(
                r"
                INSERT INTO shop.order_items
                    (order_id, line_number, product_id, variant_position,
                     product_name, quantity, unit_price)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ",
            )
            .bind(new.id)
            .bind(line_number)
            .bind(line.product_id)
            .bind(line.variant_index)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;

            items.push(OrderItem {
                line_number,
                product_id: line.product_id,
                variant_index: line.variant_index,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        tx.commit().await?;
        row.into_order(items)
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored order is invalid.
    pub async fn get(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row = fetch_order_row(&mut conn, id, false).await?;
        match row {
            Some(row) => {
                let items = fetch_items(&mut conn, id).await?;
                Ok(Some(row.into_order(items)?))
            }
            None => Ok(None),
        }
    }

    /// List orders newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored order is invalid.
    pub async fn list(
        &self,
        scope: OrderScope,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = match scope {
            OrderScope::Owner(user_id) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    r"
                    SELECT {ORDER_COLUMNS} FROM shop.orders
                    WHERE user_id = $1
                    ORDER BY created_at DESC, id
                    LIMIT $2 OFFSET $3
                    "
                ))
                .bind(user_id)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
            OrderScope::All => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    r"
                    SELECT {ORDER_COLUMNS} FROM shop.orders
                    ORDER BY created_at DESC, id
                    LIMIT $1 OFFSET $2
                    "
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool)
                .await?
            }
        };

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, line_number, product_id, variant_position,
                   product_name, quantity, unit_price
            FROM shop.order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, line_number
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id.clone()).or_default().push(row.into());
        }

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }

    /// Capture an order and deduct its stock, all or nothing.
    ///
    /// Runs in one transaction. Locks the order row, then every product row
    /// the order draws from by id, then every variant row by
    /// `(product_id, position)`. A concurrent capture of the same order waits
    /// on the order row and then sees the terminal status; concurrent
    /// captures of different orders competing for the same stock serialise
    /// on the stock rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; the transaction
    /// is rolled back and nothing changes.
    #[instrument(skip(self), fields(order_id = %id, payment_id = %payment_id))]
    pub async fn capture(
        &self,
        id: &OrderId,
        payment_id: &PaymentId,
    ) -> Result<CaptureOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = fetch_order_row(&mut tx, id, true).await? else {
            return Ok(CaptureOutcome::NotFound);
        };
        let items = fetch_items(&mut tx, id).await?;

        let current = row.status;
        if current.is_terminal() {
            let order = row.into_order(items)?;
            return Ok(if current == OrderStatus::Captured {
                CaptureOutcome::AlreadyCaptured(order)
            } else {
                CaptureOutcome::AlreadyFailed(order)
            });
        }

        let demand = aggregate_demand(
            items
                .iter()
                .map(|i| (StockKey::new(i.product_id, i.variant_index), i.quantity)),
        );
        let available = lock_stock(&mut tx, demand.keys()).await?;

        let shortfalls = match plan_deductions(&demand, &available) {
            Ok(deductions) => {
                for d in &deductions {
                    apply_deduction(&mut tx, d.key, d.quantity).await?;
                }
                None
            }
            Err(StockError::Insufficient(shortfalls)) => Some(shortfalls),
        };

        let next = if shortfalls.is_none() {
            OrderStatus::Captured
        } else {
            OrderStatus::FailedOutOfStock
        };
        if !current.can_transition_to(next) {
            return Err(RepositoryError::DataCorruption(format!(
                "order {id} cannot move from {current} to {next}"
            )));
        }

        let updated = if shortfalls.is_none() {
            sqlx::query_as::<_, OrderRow>(&format!(
                r"
                UPDATE shop.orders
                SET status = $2, payment_id = $3, captured_at = NOW(), updated_at = NOW()
                WHERE id = $1
                RETURNING {ORDER_COLUMNS}
                "
            ))
            .bind(id)
            .bind(OrderStatus::Captured)
            .bind(payment_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            sqlx::query_as::<_, OrderRow>(&format!(
                r"
                UPDATE shop.orders
                SET status = $2, updated_at = NOW()
                WHERE id = $1
                RETURNING {ORDER_COLUMNS}
                "
            ))
            .bind(id)
            .bind(OrderStatus::FailedOutOfStock)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;

        let order = updated.into_order(items)?;
        Ok(match shortfalls {
            None => CaptureOutcome::Captured(order),
            Some(shortfalls) => CaptureOutcome::OutOfStock { order, shortfalls },
        })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn fetch_order_row(
    conn: &mut PgConnection,
    id: &OrderId,
    for_update: bool,
) -> Result<Option<OrderRow>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

async fn fetch_items(
    conn: &mut PgConnection,
    id: &OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT order_id, line_number, product_id, variant_position,
               product_name, quantity, unit_price
        FROM shop.order_items
        WHERE order_id = $1
        ORDER BY line_number
        ",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Into::into).collect())
}

/// Lock and read every stock counter in `keys`.
///
/// Product rows are locked (ordered by id) before variant rows (ordered by
/// product, then position). Counters with no row are absent from the map.
async fn lock_stock<'k>(
    conn: &mut PgConnection,
    keys: impl Iterator<Item = &'k StockKey>,
) -> Result<HashMap<StockKey, i32>, RepositoryError> {
    let mut product_ids = Vec::new();
    let mut variant_products = Vec::new();
    let mut variant_positions = Vec::new();
    for key in keys {
        product_ids.push(key.product_id.as_i32());
        if let Some(position) = key.variant_index {
            variant_products.push(key.product_id.as_i32());
            variant_positions.push(position);
        }
    }
    product_ids.sort_unstable();
    product_ids.dedup();

    let products = sqlx::query_as::<_, ProductStockRow>(
        "SELECT id, stock FROM shop.products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&product_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut available: HashMap<StockKey, i32> = products
        .into_iter()
        .map(|p| (StockKey::product(ProductId::new(p.id)), p.stock))
        .collect();

    if !variant_products.is_empty() {
        let variants = sqlx::query_as::<_, VariantStockRow>(
            r"
            SELECT product_id, position, stock
            FROM shop.product_variants
            WHERE (product_id, position) IN (
                SELECT * FROM UNNEST($1::int4[], $2::int4[])
            )
            ORDER BY product_id, position
            FOR UPDATE
            ",
        )
        .bind(&variant_products)
        .bind(&variant_positions)
        .fetch_all(&mut *conn)
        .await?;

        available.extend(variants.into_iter().map(|v| {
            (
                StockKey::variant(ProductId::new(v.product_id), v.position),
                v.stock,
            )
        }));
    }

    Ok(available)
}

async fn apply_deduction(
    conn: &mut PgConnection,
    key: StockKey,
    quantity: i32,
) -> Result<(), RepositoryError> {
    match key.variant_index {
        None => {
            sqlx::query(
                "UPDATE shop.products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(key.product_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        }
        Some(position) => {
            sqlx::query(
                r"
                UPDATE shop.product_variants SET stock = stock - $3
                WHERE product_id = $1 AND position = $2
                ",
            )
            .bind(key.product_id)
            .bind(position)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}
