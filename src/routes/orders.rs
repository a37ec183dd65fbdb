//! Order routes — customer checkout and tracking, owner pipeline control.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::stalls::{load_owned_stall, load_stall};
use crate::services::cart::{CartLine, PricedCart};
use crate::services::order::{self as order_svc, NewOrder, OrderError, OrderFilter};
use crate::state::{AppState, Order};
use crate::status::OrderStatus;

pub(crate) fn order_error_to_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::StallNotLoaded(_) | OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::StallClosed(_)
        | OrderError::StaleUpdate { .. }
        | OrderError::InvalidTransition(_)
        | OrderError::NotCancellable(_) => StatusCode::CONFLICT,
        OrderError::Cart(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        Self::from_error(order_error_to_status(&err), &err)
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::from_str(raw)
        .ok_or_else(|| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, format!("unknown order status: {raw}")))
}

#[derive(Debug, Deserialize)]
pub struct QuoteBody {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    /// `active=true` hides completed and cancelled orders.
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
    /// Version the client last saw. Omit to skip the staleness check.
    pub expected_version: Option<i32>,
}

/// `POST /api/stalls/:id/cart/quote` — price a cart without ordering.
pub async fn quote(
    State(state): State<AppState>,
    Path(stall_id): Path<Uuid>,
    Json(body): Json<QuoteBody>,
) -> Result<Json<PricedCart>, ApiError> {
    load_stall(&state, stall_id).await?;
    let priced = order_svc::quote_cart(&state, stall_id, &body.lines).await?;
    Ok(Json(priced))
}

/// `POST /api/stalls/:id/orders` — place an order.
pub async fn create_order(
    State(state): State<AppState>,
    Path(stall_id): Path<Uuid>,
    Json(body): Json<NewOrder>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    load_stall(&state, stall_id).await?;
    let order = order_svc::create_order(&state, stall_id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/stalls/:id/orders` — owner order board.
pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let filter = OrderFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        active_only: query.active.unwrap_or(false),
    };
    let orders = order_svc::list_orders(&state, stall_id, filter).await?;
    Ok(Json(orders))
}

/// `GET /api/stalls/:id/orders/:order_id` — customer order tracking.
pub async fn get_order(
    State(state): State<AppState>,
    Path((stall_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Order>, ApiError> {
    load_stall(&state, stall_id).await?;
    let order = order_svc::get_order(&state, stall_id, order_id).await?;
    Ok(Json(order))
}

/// `PATCH /api/stalls/:id/orders/:order_id` — owner status transition.
pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((stall_id, order_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Order>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let target = parse_status(&body.status)?;
    let order = order_svc::update_status(&state, stall_id, order_id, target, body.expected_version).await?;
    Ok(Json(order))
}

/// `POST /api/stalls/:id/orders/:order_id/cancel` — customer cancel.
pub async fn cancel_order(
    State(state): State<AppState>,
    Path((stall_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Order>, ApiError> {
    load_stall(&state, stall_id).await?;
    let order = order_svc::cancel_by_customer(&state, stall_id, order_id).await?;
    Ok(Json(order))
}

#[cfg(test)]
#[path = "orders_test.rs"]
mod tests;
