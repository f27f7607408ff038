//! Catalog routes.

use axum::{Json, extract::State};
use tracing::instrument;

use emporium_core::ProductId;

use super::ApiPath;
use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::Product;
use crate::state::AppState;

/// List every product with its variants.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = ProductRepository::new(state.pool()).list().await?;
    Ok(Json(products))
}

/// Product detail.
///
/// GET /api/products/{id}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Product {id} not found")))
}
