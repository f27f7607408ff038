//! Manual stock adjustment against a real database.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use emporium_api::services::InventoryService;
use emporium_api::services::inventory::{InventoryError, StockUpdateRequest};
use emporium_core::{ProductId, UserRole};
use emporium_integration_tests::{create_user, seed_simple, seed_variable, stock_of};

const fn set(stock: i64, variant_index: Option<i64>) -> StockUpdateRequest {
    StockUpdateRequest {
        stock,
        variant_index,
    }
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_admin_sets_product_and_variant_stock(pool: PgPool) {
    let admin = create_user(&pool, "ops@example.in", UserRole::Admin).await;
    seed_simple(&pool, 1, "Cotton Tee", 500, 10).await;
    seed_variable(&pool, 2, "Hoodie", &[("S", 400, 3), ("M", 450, 1)]).await;
    let inventory = InventoryService::new(&pool);

    let level = inventory
        .update_stock(&admin, ProductId::new(1), set(25, None))
        .await
        .unwrap();
    assert_eq!(level.stock, 25);
    assert_eq!(level.variant_index, None);

    let level = inventory
        .update_stock(&admin, ProductId::new(2), set(0, Some(1)))
        .await
        .unwrap();
    assert_eq!(level.variant_index, Some(1));

    assert_eq!(stock_of(&pool, 1).await, (25, vec![]));
    assert_eq!(stock_of(&pool, 2).await, (0, vec![3, 0]));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_stock_update_rejections(pool: PgPool) {
    let admin = create_user(&pool, "ops@example.in", UserRole::Admin).await;
    let customer = create_user(&pool, "asha@example.in", UserRole::Customer).await;
    seed_simple(&pool, 1, "Cotton Tee", 500, 10).await;
    seed_variable(&pool, 2, "Hoodie", &[("S", 400, 3)]).await;
    let inventory = InventoryService::new(&pool);

    assert!(matches!(
        inventory
            .update_stock(&customer, ProductId::new(1), set(5, None))
            .await,
        Err(InventoryError::Forbidden)
    ));
    assert!(matches!(
        inventory
            .update_stock(&admin, ProductId::new(1), set(-1, None))
            .await,
        Err(InventoryError::InvalidStock(_))
    ));
    assert!(matches!(
        inventory
            .update_stock(&admin, ProductId::new(2), set(5, None))
            .await,
        Err(InventoryError::VariantRequired)
    ));
    assert!(matches!(
        inventory
            .update_stock(&admin, ProductId::new(2), set(5, Some(1)))
            .await,
        Err(InventoryError::VariantOutOfRange { .. })
    ));
    assert!(matches!(
        inventory
            .update_stock(&admin, ProductId::new(1), set(5, Some(0)))
            .await,
        Err(InventoryError::NoVariants)
    ));
    assert!(matches!(
        inventory
            .update_stock(&admin, ProductId::new(99), set(5, None))
            .await,
        Err(InventoryError::ProductNotFound(_))
    ));

    assert_eq!(stock_of(&pool, 1).await, (10, vec![]));
    assert_eq!(stock_of(&pool, 2).await, (0, vec![3]));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_demoted_admin_loses_access(pool: PgPool) {
    let admin = create_user(&pool, "ops@example.in", UserRole::Admin).await;
    seed_simple(&pool, 1, "Cotton Tee", 500, 10).await;

    let demoted = emporium_api::db::UserRepository::new(&pool)
        .set_role(&admin.email, UserRole::Customer)
        .await
        .unwrap();

    assert!(matches!(
        InventoryService::new(&pool)
            .update_stock(&demoted, ProductId::new(1), set(5, None))
            .await,
        Err(InventoryError::Forbidden)
    ));
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires DATABASE_URL"]
async fn test_variant_position_gap_is_out_of_range(pool: PgPool) {
    let admin = create_user(&pool, "ops@example.in", UserRole::Admin).await;
    seed_variable(&pool, 2, "Hoodie", &[("S", 400, 3), ("M", 450, 4), ("L", 450, 5)]).await;
    sqlx::query("DELETE FROM shop.product_variants WHERE product_id = 2 AND position = 1")
        .execute(&pool)
        .await
        .unwrap();

    // Two variants remain, so index 1 passes the count check but names no row.
    assert!(matches!(
        InventoryService::new(&pool)
            .update_stock(&admin, ProductId::new(2), set(9, Some(1)))
            .await,
        Err(InventoryError::VariantOutOfRange { index: 1, .. })
    ));
    assert_eq!(stock_of(&pool, 2).await, (0, vec![3, 5]));
}
