//! Persistence service — background flush for dirty orders and menu items.
//!
//! DESIGN
//! ======
//! Order and menu mutations only touch memory and mark the row dirty. A
//! background task snapshots dirty rows under the lock, writes them to
//! Postgres without holding it, then acknowledges what it wrote. Menu
//! deletes travel as tombstones and are applied after the upserts of the
//! same batch. Batches run one at a time, so a delete queued while an
//! upsert is in flight always lands after it.
//!
//! After each flush the task trims old finished orders and evicts idle
//! stalls (see `stall::evict_idle`).
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after successful writes, and only when the
//! in-memory version still matches the version that was written. A failed
//! flush leaves every flag in place for the next cycle.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::types::Json;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::{menu, stall};
use crate::state::{AppState, MenuItem, Order, now_ms};

#[derive(Debug)]
pub(crate) struct DirtyFlushBatch {
    pub(crate) stall_id: Uuid,
    pub(crate) orders: Vec<Order>,
    pub(crate) items: Vec<MenuItem>,
    pub(crate) deleted_items: Vec<Uuid>,
}

impl DirtyFlushBatch {
    fn order_versions(&self) -> Vec<(Uuid, i32)> {
        self.orders.iter().map(|o| (o.id, o.version)).collect()
    }

    fn item_versions(&self) -> Vec<(Uuid, i32)> {
        self.items.iter().map(|i| (i.id, i.version)).collect()
    }
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = state.config.order_flush_interval_ms.max(1);
    info!(flush_interval_ms, "order persistence flush configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(flush_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            flush_all_dirty(&state).await;
            stall::evict_idle(&state, now_ms()).await;
        }
    })
}

/// Flush every dirty row once.
pub async fn flush_all_dirty(state: &AppState) {
    let batches = snapshot_dirty(state).await;

    for batch in batches {
        match write_batch(&state.pool, &batch).await {
            Ok(()) => {
                clear_flushed(
                    state,
                    batch.stall_id,
                    &batch.order_versions(),
                    &batch.item_versions(),
                    &batch.deleted_items,
                )
                .await;
            }
            Err(e) => {
                error!(
                    error = %e,
                    stall_id = %batch.stall_id,
                    orders = batch.orders.len(),
                    items = batch.items.len(),
                    deleted_items = batch.deleted_items.len(),
                    "persistence flush failed"
                );
            }
        }
    }
}

/// Clone dirty rows of every real stall under the lock.
pub(crate) async fn snapshot_dirty(state: &AppState) -> Vec<DirtyFlushBatch> {
    let stalls = state.stalls.read().await;
    let mut collected = Vec::new();

    for (stall_id, stall_state) in stalls.iter() {
        if stall_state.stall.is_demo {
            continue;
        }
        if stall_state.is_clean() {
            continue;
        }

        let orders: Vec<Order> = stall_state
            .dirty_orders
            .iter()
            .filter_map(|id| stall_state.orders.get(id).cloned())
            .collect();
        let items: Vec<MenuItem> = stall_state
            .dirty_menu
            .iter()
            .filter_map(|id| stall_state.menu.get(id).cloned())
            .collect();
        let deleted_items: Vec<Uuid> = stall_state.deleted_menu.iter().copied().collect();
        if orders.is_empty() && items.is_empty() && deleted_items.is_empty() {
            continue;
        }
        collected.push(DirtyFlushBatch { stall_id: *stall_id, orders, items, deleted_items });
    }

    collected
}

async fn write_batch(pool: &PgPool, batch: &DirtyFlushBatch) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for order in &batch.orders {
        upsert_order(&mut tx, order).await?;
    }
    for item in &batch.items {
        menu::upsert_item(&mut tx, item).await?;
    }
    for item_id in &batch.deleted_items {
        menu::delete_item_row(&mut tx, *item_id).await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn upsert_order(conn: &mut sqlx::PgConnection, order: &Order) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, stall_id, number, customer_name, table_label, notes, lines, total_cents, status, \
                             history, version, created_at_ms, updated_at_ms) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (id) DO UPDATE SET \
             status = EXCLUDED.status, history = EXCLUDED.history, version = EXCLUDED.version, \
             updated_at_ms = EXCLUDED.updated_at_ms \
         WHERE orders.version < EXCLUDED.version",
    )
    .bind(order.id)
    .bind(order.stall_id)
    .bind(order.number)
    .bind(&order.customer_name)
    .bind(&order.table_label)
    .bind(&order.notes)
    .bind(Json(&order.lines))
    .bind(order.total_cents)
    .bind(order.status.as_str())
    .bind(Json(&order.history))
    .bind(order.version)
    .bind(order.created_at_ms)
    .bind(order.updated_at_ms)
    .execute(conn)
    .await?;
    Ok(())
}

pub(crate) async fn clear_flushed(
    state: &AppState,
    stall_id: Uuid,
    order_versions: &[(Uuid, i32)],
    item_versions: &[(Uuid, i32)],
    deleted_items: &[Uuid],
) {
    let mut stalls = state.stalls.write().await;
    let Some(stall_state) = stalls.get_mut(&stall_id) else {
        return;
    };

    for (order_id, flushed_version) in order_versions {
        // Keep the flag if the order moved again after the snapshot.
        let can_clear = stall_state
            .orders
            .get(order_id)
            .is_none_or(|current| current.version == *flushed_version);
        if can_clear {
            stall_state.dirty_orders.remove(order_id);
        }
    }
    for (item_id, flushed_version) in item_versions {
        let can_clear = stall_state
            .menu
            .get(item_id)
            .is_none_or(|current| current.version == *flushed_version);
        if can_clear {
            stall_state.dirty_menu.remove(item_id);
        }
    }
    for item_id in deleted_items {
        stall_state.deleted_menu.remove(item_id);
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
