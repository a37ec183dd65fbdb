//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the customer storefront API, the owner back-office API
//! and the live-feed websocket under a single Axum router. Route handlers
//! translate service errors into a status code plus a `{"error": ...}` body.

pub mod auth;
pub mod feed;
pub mod menu;
pub mod orders;
pub mod sales;
pub mod stalls;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, patch, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

// =============================================================================
// ERRORS
// =============================================================================

/// Error response carried out of every handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Build from a service error. Server-side failures are logged here and
    /// their detail is withheld from the client.
    #[must_use]
    pub fn from_error(status: StatusCode, err: &dyn std::error::Error) -> Self {
        if status.is_server_error() {
            error!(error = %err, %status, "request failed");
            return Self::new(status, "internal error");
        }
        Self::new(status, err.to_string())
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("error"))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_error(StatusCode::INTERNAL_SERVER_ERROR, &err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/demo", post(auth::demo))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/stalls/{id}", get(stalls::get_stall).patch(stalls::update_stall))
        .route("/api/stalls/{id}/qr", get(stalls::qr))
        .route("/api/stalls/{id}/menu", get(menu::list_menu).post(menu::create_item))
        .route(
            "/api/stalls/{id}/menu/{item_id}",
            patch(menu::update_item).delete(menu::delete_item),
        )
        .route("/api/stalls/{id}/cart/quote", post(orders::quote))
        .route("/api/stalls/{id}/orders", get(orders::list_orders).post(orders::create_order))
        .route(
            "/api/stalls/{id}/orders/{order_id}",
            get(orders::get_order).patch(orders::update_status),
        )
        .route("/api/stalls/{id}/orders/{order_id}/cancel", post(orders::cancel_order))
        .route("/api/stalls/{id}/sales", get(sales::sales_summary))
        .route("/api/stalls/{id}/billing", get(sales::billing))
        .route("/api/stalls/{id}/feed", get(feed::handle_feed))
        .route("/healthz", get(healthz))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
