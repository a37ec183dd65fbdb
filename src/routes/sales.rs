//! Sales routes — owner dashboard and billing statements.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use time::Duration;
use uuid::Uuid;

use crate::routes::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::stalls::load_owned_stall;
use crate::services::sales::{self as sales_svc, BillingStatement, SalesError, SalesSummary};
use crate::state::{AppState, now_ms};

const DEFAULT_SUMMARY_DAYS: i64 = 7;
const DEFAULT_BILLING_DAYS: i64 = 30;

pub(crate) fn sales_error_to_status(err: &SalesError) -> StatusCode {
    match err {
        SalesError::InvalidDate(_) | SalesError::InvalidRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SalesError::StallNotLoaded(_) => StatusCode::NOT_FOUND,
    }
}

impl From<SalesError> for ApiError {
    fn from(err: SalesError) -> Self {
        Self::from_error(sales_error_to_status(&err), &err)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillingQuery {
    /// Inclusive `YYYY-MM-DD`. Defaults to 29 days before `to`.
    pub from: Option<String>,
    /// Inclusive `YYYY-MM-DD`. Defaults to today (UTC).
    pub to: Option<String>,
}

/// `GET /api/stalls/:id/sales` — dashboard summary.
pub async fn sales_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    Query(query): Query<SalesQuery>,
) -> Result<Json<SalesSummary>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let days = query.days.unwrap_or(DEFAULT_SUMMARY_DAYS);
    let summary = sales_svc::stall_summary(&state, stall_id, now_ms(), days).await?;
    Ok(Json(summary))
}

/// `GET /api/stalls/:id/billing` — completed orders in a date range.
pub async fn billing(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(stall_id): Path<Uuid>,
    Query(query): Query<BillingQuery>,
) -> Result<Json<BillingStatement>, ApiError> {
    load_owned_stall(&state, &auth, stall_id).await?;
    let (from, to) = billing_range(&query, now_ms())?;
    let statement = sales_svc::stall_billing(&state, stall_id, from, to).await?;
    Ok(Json(statement))
}

/// Resolve the query's date range, filling in defaults.
pub(crate) fn billing_range(query: &BillingQuery, now_ms: i64) -> Result<(time::Date, time::Date), SalesError> {
    let to = match query.to.as_deref() {
        Some(raw) => sales_svc::parse_date(raw)?,
        None => sales_svc::utc_date(now_ms),
    };
    let from = match query.from.as_deref() {
        Some(raw) => sales_svc::parse_date(raw)?,
        None => to - Duration::days(DEFAULT_BILLING_DAYS - 1),
    };
    Ok((from, to))
}

#[cfg(test)]
#[path = "sales_test.rs"]
mod tests;
