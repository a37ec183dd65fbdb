//! Sales analytics — dashboard summary and billing statements.
//!
//! All bucketing is by UTC calendar date. Revenue only counts completed
//! orders; cancelled orders are reported but never billed.

use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Duration, Month, OffsetDateTime};
use uuid::Uuid;

use crate::state::{AppState, Order};
use crate::status::OrderStatus;

pub const MAX_SUMMARY_DAYS: i64 = 90;
pub const TOP_ITEM_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SalesError {
    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),
    #[error("invalid range: {from} is after {to}")]
    InvalidRange { from: String, to: String },
    #[error("stall not loaded: {0}")]
    StallNotLoaded(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySales {
    pub date: String,
    pub orders: u32,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopItem {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    pub days: i64,
    pub revenue_cents: i64,
    pub completed_orders: u32,
    pub cancelled_orders: u32,
    pub active_orders: u32,
    pub average_order_cents: i64,
    pub status_counts: Vec<StatusCount>,
    pub daily: Vec<DailySales>,
    pub top_items: Vec<TopItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingLine {
    pub order_id: Uuid,
    pub number: i32,
    pub completed_at_ms: i64,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillingStatement {
    pub from: String,
    pub to: String,
    pub order_count: u32,
    pub total_cents: i64,
    pub lines: Vec<BillingLine>,
}

/// UTC calendar date of a unix-millisecond timestamp.
#[must_use]
pub fn utc_date(ms: i64) -> Date {
    OffsetDateTime::from_unix_timestamp(ms.div_euclid(1000)).map_or(Date::MIN, OffsetDateTime::date)
}

/// Parse a strict `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns `InvalidDate` for anything else.
pub fn parse_date(raw: &str) -> Result<Date, SalesError> {
    let invalid = || SalesError::InvalidDate(raw.to_owned());
    let mut parts = raw.trim().splitn(3, '-');
    let (Some(y), Some(m), Some(d)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = y.parse().map_err(|_| invalid())?;
    let month: u8 = m.parse().map_err(|_| invalid())?;
    let day: u8 = d.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;
    Date::from_calendar_date(year, month, day).map_err(|_| invalid())
}

/// Summarize orders placed in the last `days` UTC days (including today).
#[must_use]
pub fn summarize<'a, I>(orders: I, now_ms: i64, days: i64) -> SalesSummary
where
    I: IntoIterator<Item = &'a Order>,
{
    let days = days.clamp(1, MAX_SUMMARY_DAYS);
    let today = utc_date(now_ms);
    let start = today - Duration::days(days - 1);

    let mut daily: Vec<DailySales> = (0..days)
        .map(|offset| DailySales { date: (start + Duration::days(offset)).to_string(), orders: 0, revenue_cents: 0 })
        .collect();
    let mut status_counts: HashMap<OrderStatus, u32> = HashMap::new();
    let mut items: HashMap<Uuid, TopItem> = HashMap::new();
    let mut revenue_cents = 0_i64;

    for order in orders {
        let date = utc_date(order.created_at_ms);
        if date < start || date > today {
            continue;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let bucket = &mut daily[(date - start).whole_days() as usize];
        bucket.orders += 1;
        *status_counts.entry(order.status).or_insert(0) += 1;

        if order.status == OrderStatus::Completed {
            bucket.revenue_cents = bucket.revenue_cents.saturating_add(order.total_cents);
            revenue_cents = revenue_cents.saturating_add(order.total_cents);
            for line in &order.lines {
                let entry = items.entry(line.item_id).or_insert_with(|| TopItem {
                    item_id: line.item_id,
                    name: line.name.clone(),
                    quantity: 0,
                    revenue_cents: 0,
                });
                entry.quantity = entry.quantity.saturating_add(line.quantity);
                entry.revenue_cents = entry.revenue_cents.saturating_add(line.line_total_cents);
            }
        }
    }

    let count_of = |status: OrderStatus| status_counts.get(&status).copied().unwrap_or(0);
    let completed_orders = count_of(OrderStatus::Completed);
    let active_orders: u32 = [OrderStatus::Pending, OrderStatus::Preparing, OrderStatus::Ready]
        .into_iter()
        .map(count_of)
        .sum();

    let mut top_items: Vec<TopItem> = items.into_values().collect();
    top_items.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.name.cmp(&b.name)));
    top_items.truncate(TOP_ITEM_LIMIT);

    SalesSummary {
        days,
        revenue_cents,
        completed_orders,
        cancelled_orders: count_of(OrderStatus::Cancelled),
        active_orders,
        average_order_cents: if completed_orders == 0 { 0 } else { revenue_cents / i64::from(completed_orders) },
        status_counts: OrderStatus::ALL
            .into_iter()
            .map(|status| StatusCount { status, count: count_of(status) })
            .collect(),
        daily,
        top_items,
    }
}

/// Completed orders whose completion date falls in `[from, to]`.
///
/// # Errors
///
/// Returns `InvalidRange` when `from` is after `to`.
pub fn billing_statement<'a, I>(orders: I, from: Date, to: Date) -> Result<BillingStatement, SalesError>
where
    I: IntoIterator<Item = &'a Order>,
{
    if from > to {
        return Err(SalesError::InvalidRange { from: from.to_string(), to: to.to_string() });
    }

    let mut lines: Vec<BillingLine> = orders
        .into_iter()
        .filter(|order| order.status == OrderStatus::Completed)
        .filter_map(|order| {
            let completed_at_ms = order.status_changed_at_ms();
            let date = utc_date(completed_at_ms);
            (date >= from && date <= to).then(|| BillingLine {
                order_id: order.id,
                number: order.number,
                completed_at_ms,
                total_cents: order.total_cents,
            })
        })
        .collect();
    lines.sort_by(|a, b| a.completed_at_ms.cmp(&b.completed_at_ms).then(a.number.cmp(&b.number)));

    #[allow(clippy::cast_possible_truncation)]
    let order_count = lines.len() as u32;
    Ok(BillingStatement {
        from: from.to_string(),
        to: to.to_string(),
        order_count,
        total_cents: lines.iter().fold(0, |acc, line| acc.saturating_add(line.total_cents)),
        lines,
    })
}

/// Dashboard summary for a loaded stall.
///
/// # Errors
///
/// Returns `StallNotLoaded` if the stall isn't in memory.
pub async fn stall_summary(state: &AppState, stall_id: Uuid, now_ms: i64, days: i64) -> Result<SalesSummary, SalesError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls.get(&stall_id).ok_or(SalesError::StallNotLoaded(stall_id))?;
    Ok(summarize(stall_state.orders.values(), now_ms, days))
}

/// Billing statement for a loaded stall.
///
/// # Errors
///
/// Returns `StallNotLoaded` or `InvalidRange`.
pub async fn stall_billing(state: &AppState, stall_id: Uuid, from: Date, to: Date) -> Result<BillingStatement, SalesError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls.get(&stall_id).ok_or(SalesError::StallNotLoaded(stall_id))?;
    billing_statement(stall_state.orders.values(), from, to)
}

#[cfg(test)]
#[path = "sales_test.rs"]
mod tests;
