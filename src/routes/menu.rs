//! Menu routes — public listing, owner CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::stalls::{load_owned_stall, load_stall};
use crate::services::menu::{self as menu_svc, MenuError, MenuItemPatch, NewMenuItem};
use crate::state::{AppState, MenuItem};

pub(crate) fn menu_error_to_status(err: &MenuError) -> StatusCode {
    match err {
        MenuError::StallNotLoaded(_) | MenuError::NotFound(_) => StatusCode::NOT_FOUND,
        MenuError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl From<MenuError> for ApiError {
    fn from(err: MenuError) -> Self {
        Self::from_error(menu_error_to_status(&err), &err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MenuQuery {
    /// Customers pass `available=true` to hide sold-out dishes.
    pub available: Option<bool>,
}

/// `GET /api/stalls/:id/menu` — list menu items.
pub async fn list_menu(
    State(state): State<AppState>,
    Path(stall_id): Path<Uuid>,
    Query(query): Query<MenuQuery>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    load_stall(&state, stall_id).await?;
    let items = menu_svc::list_menu(&state, stall_id, query.available.unwrap_or(false)).await?;
    Ok(Json(items))
}

/// `POST /api/stalls/:id/menu` — add a dish.
pub async fn create_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    Json(body): Json<NewMenuItem>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let item = menu_svc::create_item(&state, stall_id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// `PATCH /api/stalls/:id/menu/:item_id` — partial update.
pub async fn update_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((stall_id, item_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<MenuItemPatch>,
) -> Result<Json<MenuItem>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let item = menu_svc::update_item(&state, stall_id, item_id, patch).await?;
    Ok(Json(item))
}

/// `DELETE /api/stalls/:id/menu/:item_id` — remove a dish.
pub async fn delete_item(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((stall_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    menu_svc::delete_item(&state, stall_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "menu_test.rs"]
mod tests;
