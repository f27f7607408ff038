//! Order lifecycle routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::OrderId;

use super::{ApiJson, ApiPath, ApiQuery};
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::services::OrderService;
use crate::services::orders::{
    CreateOrderRequest, CreatedOrder, VerifiedPayment, VerifyPaymentRequest,
};
use crate::state::AppState;

/// Pagination for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Price the cart, open a gateway order and record it.
///
/// POST /api/orders
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreatedOrder>), AppError> {
    let created = OrderService::new(&state)
        .create_order(&user, request)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Verify the payment signature and capture the order.
///
/// POST /api/orders/verify
#[instrument(skip(state, user, request), fields(user_id = %user.id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<VerifyPaymentRequest>,
) -> Result<Json<VerifiedPayment>, AppError> {
    let verified = OrderService::new(&state)
        .verify_payment(&user, request)
        .await?;
    Ok(Json(verified))
}

/// Orders visible to the caller, newest first.
///
/// GET /api/orders
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiQuery(query): ApiQuery<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let orders = OrderService::new(&state)
        .list(&user, query.limit, query.offset)
        .await?;
    Ok(Json(orders))
}

/// Order detail for its owner or an admin.
///
/// GET /api/orders/{id}
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>, AppError> {
    let order = OrderService::new(&state).get(&user, &id).await?;
    Ok(Json(order))
}
