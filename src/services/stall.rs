//! Stall service — creation, hydration, profile, and ownership.
//!
//! DESIGN
//! ======
//! A stall is hydrated from Postgres on first access and then stays in
//! memory. Only the last `ORDER_HISTORY_DAYS` of orders are loaded, but the
//! ticket counter continues from the highest number ever issued. Demo
//! stalls load their menu from Postgres like any other stall; their orders
//! are synthesized instead of read.

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::event::OrderEvent;
use crate::services::{demo, feed, menu};
use crate::state::{AppState, MenuItem, Order, OrderLine, Stall, StallState, StatusChange, now_ms};
use crate::status::OrderStatus;

const DAY_MS: i64 = 86_400_000;

#[derive(Debug, thiserror::Error)]
pub enum StallError {
    #[error("stall not found: {0}")]
    NotFound(Uuid),
    #[error("not the owner of this stall")]
    Forbidden,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Partial profile update from the back office.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct StallPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub is_open: Option<bool>,
}

type StallRow = (Uuid, Uuid, String, String, String, bool, bool, i64);

type OrderRow = (
    Uuid,
    i32,
    Option<String>,
    Option<String>,
    Option<String>,
    Json<Vec<OrderLine>>,
    i64,
    String,
    Json<Vec<StatusChange>>,
    i32,
    i64,
    i64,
);

type MenuRow = (Uuid, String, String, String, i64, bool, Option<String>, i32, i32);

// =============================================================================
// CREATE
// =============================================================================

/// Insert a stall row and seed it with the starter menu.
///
/// Runs on the caller's connection so registration can create the owner and
/// the stall in one transaction.
///
/// # Errors
///
/// Returns `Invalid` for a blank name, or a database error.
pub async fn create_stall(conn: &mut PgConnection, owner_id: Uuid, name: &str, is_demo: bool) -> Result<Stall, StallError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StallError::Invalid("stall name must not be blank"));
    }
    let stall = Stall {
        id: Uuid::new_v4(),
        owner_id,
        name: name.to_owned(),
        description: String::new(),
        location: String::new(),
        is_open: true,
        is_demo,
        created_at_ms: now_ms(),
    };

    sqlx::query(
        "INSERT INTO stalls (id, owner_id, name, description, location, is_open, is_demo, created_at_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(stall.id)
    .bind(stall.owner_id)
    .bind(&stall.name)
    .bind(&stall.description)
    .bind(&stall.location)
    .bind(stall.is_open)
    .bind(stall.is_demo)
    .bind(stall.created_at_ms)
    .execute(&mut *conn)
    .await?;

    for item in menu::starter_menu(stall.id) {
        menu::upsert_item(&mut *conn, &item).await?;
    }

    info!(stall_id = %stall.id, %owner_id, is_demo, "stall created");
    Ok(stall)
}

// =============================================================================
// HYDRATION
// =============================================================================

/// Make sure a stall is in memory, loading it from Postgres if needed.
///
/// # Errors
///
/// Returns `NotFound` if no such stall exists, or a database error.
pub async fn ensure_loaded(state: &AppState, stall_id: Uuid) -> Result<(), StallError> {
    if let Some(stall_state) = state.stalls.read().await.get(&stall_id) {
        stall_state.touch(now_ms());
        return Ok(());
    }

    let row = sqlx::query_as::<_, StallRow>(
        "SELECT id, owner_id, name, description, location, is_open, is_demo, created_at_ms FROM stalls WHERE id = $1",
    )
    .bind(stall_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(StallError::NotFound(stall_id))?;
    let stall = stall_from_row(row);

    let menu = load_menu(&state.pool, stall_id).await?;
    let now = now_ms();
    let (orders, max_number) = if stall.is_demo {
        (Vec::new(), 0)
    } else {
        let since = now - state.config.order_history_days * DAY_MS;
        let orders = load_orders(&state.pool, stall_id, since).await?;
        let max_number: i32 = sqlx::query_scalar("SELECT COALESCE(MAX(number), 0) FROM orders WHERE stall_id = $1")
            .bind(stall_id)
            .fetch_one(&state.pool)
            .await?;
        (orders, max_number)
    };

    let stall_state = hydrate(stall, menu, orders, max_number, now);
    let order_count = stall_state.orders.len();
    let mut stalls = state.stalls.write().await;
    // Another request may have finished hydrating while we were querying.
    if !stalls.contains_key(&stall_id) {
        stalls.insert(stall_id, stall_state);
        info!(%stall_id, orders = order_count, "stall hydrated");
    }
    Ok(())
}

/// Build live state from loaded rows. Demo stalls get synthesized orders.
#[must_use]
pub fn hydrate(stall: Stall, menu: Vec<MenuItem>, orders: Vec<Order>, max_number: i32, now_ms: i64) -> StallState {
    let orders = if stall.is_demo {
        demo::generate_orders(stall.id, &menu, now_ms, demo::DEFAULT_DEMO_ORDER_COUNT)
    } else {
        orders
    };

    let mut stall_state = StallState::new(stall);
    let highest = orders.iter().map(|o| o.number).max().unwrap_or(0).max(max_number);
    stall_state.next_order_number = highest + 1;
    stall_state.menu = menu.into_iter().map(|item| (item.id, item)).collect();
    stall_state.orders = orders.into_iter().map(|order| (order.id, order)).collect();
    stall_state
}

fn stall_from_row(row: StallRow) -> Stall {
    let (id, owner_id, name, description, location, is_open, is_demo, created_at_ms) = row;
    Stall { id, owner_id, name, description, location, is_open, is_demo, created_at_ms }
}

async fn load_menu(pool: &PgPool, stall_id: Uuid) -> Result<Vec<MenuItem>, sqlx::Error> {
    let rows = sqlx::query_as::<_, MenuRow>(
        "SELECT id, name, description, category, price_cents, available, image_url, sort_order, version \
         FROM menu_items WHERE stall_id = $1",
    )
    .bind(stall_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, name, description, category, price_cents, available, image_url, sort_order, version)| MenuItem {
            id,
            stall_id,
            name,
            description,
            category,
            price_cents,
            available,
            image_url,
            sort_order,
            version,
        })
        .collect())
}

async fn load_orders(pool: &PgPool, stall_id: Uuid, since_ms: i64) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(
        "SELECT id, number, customer_name, table_label, notes, lines, total_cents, status, history, version, \
                created_at_ms, updated_at_ms \
         FROM orders WHERE stall_id = $1 AND created_at_ms >= $2",
    )
    .bind(stall_id)
    .bind(since_ms)
    .fetch_all(pool)
    .await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        let (id, number, customer_name, table_label, notes, lines, total_cents, status, history, version, created_at_ms, updated_at_ms) =
            row;
        let Some(status) = OrderStatus::from_str(&status) else {
            warn!(%stall_id, order_id = %id, %status, "skipping order with unknown status");
            continue;
        };
        orders.push(Order {
            id,
            stall_id,
            number,
            customer_name,
            table_label,
            notes,
            lines: lines.0,
            total_cents,
            status,
            history: history.0,
            version,
            created_at_ms,
            updated_at_ms,
        });
    }
    Ok(orders)
}

// =============================================================================
// QUERIES
// =============================================================================

/// Look up the stall owned by a user.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_stall_for_owner(state: &AppState, owner_id: Uuid) -> Result<Option<Uuid>, StallError> {
    if let Some(id) = state
        .stalls
        .read()
        .await
        .values()
        .find(|ss| ss.stall.owner_id == owner_id)
        .map(|ss| ss.stall.id)
    {
        return Ok(Some(id));
    }

    let id = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM stalls WHERE owner_id = $1 ORDER BY created_at_ms ASC LIMIT 1",
    )
    .bind(owner_id)
    .fetch_optional(&state.pool)
    .await?;
    Ok(id)
}

/// Current profile of a loaded stall.
///
/// # Errors
///
/// Returns `NotFound` if the stall isn't in memory.
pub async fn get_stall(state: &AppState, stall_id: Uuid) -> Result<Stall, StallError> {
    state
        .stalls
        .read()
        .await
        .get(&stall_id)
        .map(|ss| ss.stall.clone())
        .ok_or(StallError::NotFound(stall_id))
}

/// Fail with `Forbidden` unless `user_id` owns the stall.
///
/// # Errors
///
/// Returns `Forbidden` on mismatch.
pub fn ensure_owner(stall: &Stall, user_id: Uuid) -> Result<(), StallError> {
    if stall.owner_id == user_id { Ok(()) } else { Err(StallError::Forbidden) }
}

/// QR code payload for a stall's storefront.
#[must_use]
pub fn storefront_url(config: &AppConfig, stall_id: Uuid) -> String {
    format!("{}/s/{stall_id}", config.public_base_url.trim_end_matches('/'))
}

// =============================================================================
// PROFILE
// =============================================================================

/// Trim and validate a patch.
fn normalize_patch(patch: StallPatch) -> Result<StallPatch, StallError> {
    let name = match patch.name {
        Some(name) => {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(StallError::Invalid("stall name must not be blank"));
            }
            Some(trimmed.to_owned())
        }
        None => None,
    };
    Ok(StallPatch {
        name,
        description: patch.description.map(|d| d.trim().to_owned()),
        location: patch.location.map(|l| l.trim().to_owned()),
        is_open: patch.is_open,
    })
}

fn assign_patch(stall: &mut Stall, patch: StallPatch) {
    if let Some(name) = patch.name {
        stall.name = name;
    }
    if let Some(description) = patch.description {
        stall.description = description;
    }
    if let Some(location) = patch.location {
        stall.location = location;
    }
    if let Some(is_open) = patch.is_open {
        stall.is_open = is_open;
    }
}

/// Apply a patch to a stall profile without touching storage.
///
/// # Errors
///
/// Returns `Invalid` for a blank name. The stall is unchanged on error.
pub fn apply_patch(stall: &mut Stall, patch: StallPatch) -> Result<(), StallError> {
    assign_patch(stall, normalize_patch(patch)?);
    Ok(())
}

/// Update a loaded stall's profile. Real stalls are written to Postgres
/// first; memory and watchers only see the change once the write succeeds.
/// Only the patched columns are written, so concurrent patches to different
/// fields both survive.
///
/// # Errors
///
/// Returns `NotFound`, `Invalid`, or a database error. The loaded stall is
/// unchanged on error.
pub async fn update_profile(state: &AppState, stall_id: Uuid, patch: StallPatch) -> Result<Stall, StallError> {
    let patch = normalize_patch(patch)?;
    let is_demo = {
        let stalls = state.stalls.read().await;
        stalls.get(&stall_id).ok_or(StallError::NotFound(stall_id))?.stall.is_demo
    };

    if !is_demo {
        sqlx::query(
            "UPDATE stalls SET name = COALESCE($2, name), description = COALESCE($3, description), \
                               location = COALESCE($4, location), is_open = COALESCE($5, is_open) \
             WHERE id = $1",
        )
        .bind(stall_id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.location)
        .bind(patch.is_open)
        .execute(&state.pool)
        .await?;
    }

    let updated = {
        let mut stalls = state.stalls.write().await;
        let stall_state = stalls.get_mut(&stall_id).ok_or(StallError::NotFound(stall_id))?;
        assign_patch(&mut stall_state.stall, patch);
        stall_state.stall.clone()
    };

    feed::publish(state, stall_id, &OrderEvent::StallUpdated { stall: updated.clone() }).await;
    info!(%stall_id, is_open = updated.is_open, "stall profile updated");
    Ok(updated)
}

// =============================================================================
// EVICTION
// =============================================================================

/// Demo order books are regenerated on load, so they keep one week.
const DEMO_HISTORY_DAYS: i64 = 7;

/// Trim finished orders older than the history window and drop idle stalls
/// from memory. Returns the number of stalls evicted.
///
/// Only terminal orders with nothing left to flush are trimmed. A stall is
/// evicted when it has no feed watchers, nothing left to flush, and no
/// request for `stall_idle_secs`. The next request hydrates it again.
pub async fn evict_idle(state: &AppState, now_ms: i64) -> usize {
    let mut stalls = state.stalls.write().await;

    let mut trimmed = 0;
    for stall_state in stalls.values_mut() {
        let days = if stall_state.stall.is_demo { DEMO_HISTORY_DAYS } else { state.config.order_history_days };
        let cutoff = now_ms.saturating_sub(days.saturating_mul(DAY_MS));
        let before = stall_state.orders.len();
        let dirty = &stall_state.dirty_orders;
        stall_state
            .orders
            .retain(|id, order| !order.status.is_terminal() || order.created_at_ms >= cutoff || dirty.contains(id));
        trimmed += before - stall_state.orders.len();
    }

    let idle_secs = state.config.stall_idle_secs;
    let idle: Vec<Uuid> = if idle_secs == 0 {
        Vec::new()
    } else {
        let idle_ms = i64::try_from(idle_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        stalls
            .iter()
            .filter(|(_, ss)| {
                ss.watchers.is_empty() && ss.is_clean() && now_ms.saturating_sub(ss.last_access_ms()) >= idle_ms
            })
            .map(|(stall_id, _)| *stall_id)
            .collect()
    };
    for stall_id in &idle {
        stalls.remove(stall_id);
    }

    if trimmed > 0 || !idle.is_empty() {
        info!(trimmed, evicted = idle.len(), loaded = stalls.len(), "stall memory trimmed");
    }
    idle.len()
}

#[cfg(test)]
#[path = "stall_test.rs"]
mod tests;
