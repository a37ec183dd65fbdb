//! Order service — place, track, and advance orders.
//!
//! DESIGN
//! ======
//! Order mutations update in-memory stall state immediately, mark the order
//! dirty for background persistence (never for demo stalls), push a feed
//! event to watchers, and return the updated order. Clients may send the version they last saw;
//! a mismatch is rejected as stale instead of silently overwriting a newer
//! status.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::event::OrderEvent;
use crate::services::cart::{self, CartError, CartLine, PricedCart};
use crate::services::feed;
use crate::state::{AppState, Order, StallState, StatusChange, now_ms};
use crate::status::{OrderStatus, TransitionError};

const MAX_TEXT_LEN: usize = 280;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("stall not loaded: {0}")]
    StallNotLoaded(Uuid),
    #[error("stall is closed: {0}")]
    StallClosed(Uuid),
    #[error("order not found: {0}")]
    NotFound(Uuid),
    #[error("stale update: expected version {expected}, current {current}")]
    StaleUpdate { expected: i32, current: i32 },
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("order can no longer be cancelled (status {0})")]
    NotCancellable(OrderStatus),
    #[error(transparent)]
    Cart(#[from] CartError),
}

/// Customer order request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewOrder {
    pub customer_name: Option<String>,
    pub table_label: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Exclude completed and cancelled orders.
    pub active_only: bool,
}

impl OrderFilter {
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        if self.active_only && order.status.is_terminal() {
            return false;
        }
        self.status.is_none_or(|status| status == order.status)
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Place a new order on a loaded, open stall.
///
/// # Errors
///
/// Returns `StallNotLoaded`, `StallClosed`, or a cart validation error.
pub async fn create_order(state: &AppState, stall_id: Uuid, request: NewOrder) -> Result<Order, OrderError> {
    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;
    if !stall_state.stall.is_open {
        return Err(OrderError::StallClosed(stall_id));
    }

    let priced = cart::price_cart(&stall_state.menu, &request.lines)?;
    let order = insert_order(stall_state, priced, &request, now_ms());

    info!(%stall_id, order_id = %order.id, number = order.number, total_cents = order.total_cents, "order placed");
    Ok(order)
}

/// Price a cart against a loaded stall's current menu without placing it.
///
/// # Errors
///
/// Returns `StallNotLoaded` or a cart validation error.
pub async fn quote_cart(state: &AppState, stall_id: Uuid, lines: &[CartLine]) -> Result<PricedCart, OrderError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls
        .get(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;
    Ok(cart::price_cart(&stall_state.menu, lines)?)
}

/// Build a pending order, store it as dirty, and notify watchers.
/// Caller holds the stall lock.
pub(crate) fn insert_order(stall_state: &mut StallState, priced: PricedCart, request: &NewOrder, at_ms: i64) -> Order {
    let order = Order {
        id: Uuid::new_v4(),
        stall_id: stall_state.stall.id,
        number: stall_state.allocate_order_number(),
        customer_name: clean_text(request.customer_name.as_deref()),
        table_label: clean_text(request.table_label.as_deref()),
        notes: clean_text(request.notes.as_deref()),
        lines: priced.lines,
        total_cents: priced.total_cents,
        status: OrderStatus::Pending,
        history: vec![StatusChange { status: OrderStatus::Pending, at_ms }],
        version: 1,
        created_at_ms: at_ms,
        updated_at_ms: at_ms,
    };

    stall_state.mark_order_dirty(order.id);
    stall_state.orders.insert(order.id, order.clone());
    feed::deliver(&mut stall_state.watchers, &OrderEvent::OrderCreated { order: order.clone() });
    order
}

/// Trim free text, drop blanks, and cap length on a char boundary.
fn clean_text(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_TEXT_LEN).collect())
}

// =============================================================================
// READ
// =============================================================================

/// Fetch one order.
///
/// # Errors
///
/// Returns `StallNotLoaded` or `NotFound`.
pub async fn get_order(state: &AppState, stall_id: Uuid, order_id: Uuid) -> Result<Order, OrderError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls
        .get(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;
    stall_state
        .orders
        .get(&order_id)
        .cloned()
        .ok_or(OrderError::NotFound(order_id))
}

/// List orders matching the filter, newest first.
///
/// # Errors
///
/// Returns `StallNotLoaded` if the stall isn't in memory.
pub async fn list_orders(state: &AppState, stall_id: Uuid, filter: OrderFilter) -> Result<Vec<Order>, OrderError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls
        .get(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;

    let mut orders: Vec<Order> = stall_state
        .orders
        .values()
        .filter(|order| filter.matches(order))
        .cloned()
        .collect();
    orders.sort_by(|a, b| {
        b.created_at_ms
            .cmp(&a.created_at_ms)
            .then(b.number.cmp(&a.number))
    });
    Ok(orders)
}

// =============================================================================
// UPDATE
// =============================================================================

/// Move an order to `target`, optionally guarded by the caller's last-seen version.
///
/// # Errors
///
/// Returns `StaleUpdate` on a version mismatch or `InvalidTransition` when the
/// pipeline forbids the move.
pub async fn update_status(
    state: &AppState,
    stall_id: Uuid,
    order_id: Uuid,
    target: OrderStatus,
    expected_version: Option<i32>,
) -> Result<Order, OrderError> {
    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;

    let order = apply_transition(stall_state, order_id, target, expected_version, now_ms())?;
    info!(%stall_id, %order_id, status = %order.status, version = order.version, "order status changed");
    Ok(order)
}

/// Customer-side cancel. Only allowed before the kitchen starts.
///
/// # Errors
///
/// Returns `NotCancellable` once the order has left `pending`.
pub async fn cancel_by_customer(state: &AppState, stall_id: Uuid, order_id: Uuid) -> Result<Order, OrderError> {
    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(OrderError::StallNotLoaded(stall_id))?;

    let current = stall_state
        .orders
        .get(&order_id)
        .ok_or(OrderError::NotFound(order_id))?
        .status;
    if current != OrderStatus::Pending {
        return Err(OrderError::NotCancellable(current));
    }

    let order = apply_transition(stall_state, order_id, OrderStatus::Cancelled, None, now_ms())?;
    info!(%stall_id, %order_id, "order cancelled by customer");
    Ok(order)
}

/// Validate and apply a transition under an already-held stall lock.
pub(crate) fn apply_transition(
    stall_state: &mut StallState,
    order_id: Uuid,
    target: OrderStatus,
    expected_version: Option<i32>,
    at_ms: i64,
) -> Result<Order, OrderError> {
    let order = stall_state
        .orders
        .get_mut(&order_id)
        .ok_or(OrderError::NotFound(order_id))?;

    if let Some(expected) = expected_version {
        if expected != order.version {
            return Err(OrderError::StaleUpdate { expected, current: order.version });
        }
    }

    order.status = order.status.transition(target)?;
    order.history.push(StatusChange { status: target, at_ms });
    order.version += 1;
    order.updated_at_ms = at_ms;

    let updated = order.clone();
    stall_state.mark_order_dirty(order_id);
    feed::deliver(&mut stall_state.watchers, &OrderEvent::OrderUpdated { order: updated.clone() });
    Ok(updated)
}

#[cfg(test)]
#[path = "order_test.rs"]
mod tests;
