//! Store operator routes.

use axum::{Json, extract::State};
use tracing::instrument;

use emporium_core::ProductId;

use super::{ApiJson, ApiPath};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::services::InventoryService;
use crate::services::inventory::{StockLevel, StockUpdateRequest};
use crate::state::AppState;

/// Overwrite the stock of a product or one of its variants.
///
/// PUT /api/admin/products/{id}/stock
///
/// The role check lives in the inventory service so it applies to the
/// freshly loaded user record.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update_stock(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(request): ApiJson<StockUpdateRequest>,
) -> Result<Json<StockLevel>, AppError> {
    let level = InventoryService::new(state.pool())
        .update_stock(&user, product_id, request)
        .await?;
    Ok(Json(level))
}
