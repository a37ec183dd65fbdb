//! Stall profile routes and shared stall access helpers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::stall::{self, StallError, StallPatch};
use crate::state::{AppState, Stall};

pub(crate) fn stall_error_to_status(err: &StallError) -> StatusCode {
    match err {
        StallError::NotFound(_) => StatusCode::NOT_FOUND,
        StallError::Forbidden => StatusCode::FORBIDDEN,
        StallError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StallError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StallError> for ApiError {
    fn from(err: StallError) -> Self {
        Self::from_error(stall_error_to_status(&err), &err)
    }
}

/// Hydrate a stall for a public route.
pub(crate) async fn load_stall(state: &AppState, stall_id: Uuid) -> Result<Stall, ApiError> {
    stall::ensure_loaded(state, stall_id).await?;
    Ok(stall::get_stall(state, stall_id).await?)
}

/// Hydrate a stall and require that the caller owns it.
pub(crate) async fn load_owned_stall(state: &AppState, auth: &AuthUser, stall_id: Uuid) -> Result<Stall, ApiError> {
    let stall = load_stall(state, stall_id).await?;
    stall::ensure_owner(&stall, auth.user.id)?;
    Ok(stall)
}

/// Storefront view of a stall.
#[derive(Debug, Serialize)]
pub struct PublicStall {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub is_open: bool,
    pub is_demo: bool,
}

impl From<Stall> for PublicStall {
    fn from(stall: Stall) -> Self {
        Self {
            id: stall.id,
            name: stall.name,
            description: stall.description,
            location: stall.location,
            is_open: stall.is_open,
            is_demo: stall.is_demo,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QrPayload {
    pub stall_id: Uuid,
    pub url: String,
}

/// `GET /api/stalls/:id` — public stall profile.
pub async fn get_stall(State(state): State<AppState>, Path(stall_id): Path<Uuid>) -> Result<Json<PublicStall>, ApiError> {
    let stall = load_stall(&state, stall_id).await?;
    Ok(Json(stall.into()))
}

/// `PATCH /api/stalls/:id` — owner profile update.
pub async fn update_stall(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    Json(patch): Json<StallPatch>,
) -> Result<Json<Stall>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let stall = stall::update_profile(&state, stall_id, patch).await?;
    Ok(Json(stall))
}

/// `GET /api/stalls/:id/qr` — storefront link encoded in the stall's QR code.
pub async fn qr(State(state): State<AppState>, Path(stall_id): Path<Uuid>) -> Result<Json<QrPayload>, ApiError> {
    load_stall(&state, stall_id).await?;
    Ok(Json(QrPayload { stall_id, url: stall::storefront_url(&state.config, stall_id) }))
}

#[cfg(test)]
#[path = "stalls_test.rs"]
mod tests;
