//! Live order feed — fan-out of order events to stall watchers.
//!
//! Delivery is best-effort: each watcher has a bounded channel and events
//! are sent with `try_send`. Full channels drop the event for that watcher;
//! closed channels are pruned.

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::event::OrderEvent;
use crate::state::{AppState, Order};

pub const WATCHER_CHANNEL_CAPACITY: usize = 64;

/// Register a watcher and return the stall's active orders, oldest first,
/// under the same lock so no event can slip between snapshot and subscribe.
pub async fn subscribe(
    state: &AppState,
    stall_id: Uuid,
    connection_id: Uuid,
    tx: mpsc::Sender<OrderEvent>,
) -> Option<Vec<Order>> {
    let mut stalls = state.stalls.write().await;
    let stall_state = stalls.get_mut(&stall_id)?;
    let mut active: Vec<Order> = stall_state
        .orders
        .values()
        .filter(|order| !order.status.is_terminal())
        .cloned()
        .collect();
    active.sort_by_key(|order| (order.created_at_ms, order.number));
    stall_state.watchers.insert(connection_id, tx);
    info!(%stall_id, %connection_id, active = active.len(), "feed watcher subscribed");
    Some(active)
}

pub async fn unsubscribe(state: &AppState, stall_id: Uuid, connection_id: Uuid) {
    let mut stalls = state.stalls.write().await;
    if let Some(stall_state) = stalls.get_mut(&stall_id) {
        stall_state.watchers.remove(&connection_id);
        info!(%stall_id, %connection_id, watchers = stall_state.watchers.len(), "feed watcher left");
    }
}

/// Deliver an event to every watcher of a stall.
pub async fn publish(state: &AppState, stall_id: Uuid, event: &OrderEvent) {
    let mut stalls = state.stalls.write().await;
    let Some(stall_state) = stalls.get_mut(&stall_id) else {
        return;
    };
    deliver(&mut stall_state.watchers, event);
    debug!(%stall_id, kind = event.kind(), watchers = stall_state.watchers.len(), "feed event published");
}

/// Fan out under an already-held stall lock. Prunes closed watchers.
pub(crate) fn deliver(watchers: &mut std::collections::HashMap<Uuid, mpsc::Sender<OrderEvent>>, event: &OrderEvent) {
    watchers.retain(|_, tx| match tx.try_send(event.clone()) {
        Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
