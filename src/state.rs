//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, runtime config and a map of live stall
//! states. Each stall keeps its menu, recent orders, feed watchers and
//! dirty sets in memory; the persistence task flushes dirty rows to
//! Postgres in the background.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::event::OrderEvent;
use crate::status::OrderStatus;

// =============================================================================
// STALL
// =============================================================================

/// A hawker stall. Mirrors the `stalls` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stall {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: String,
    pub location: String,
    pub is_open: bool,
    pub is_demo: bool,
    pub created_at_ms: i64,
}

// =============================================================================
// MENU ITEM
// =============================================================================

/// In-memory menu item. Mirrors the `menu_items` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub stall_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub available: bool,
    pub image_url: Option<String>,
    pub sort_order: i32,
    pub version: i32,
}

// =============================================================================
// ORDER
// =============================================================================

/// Priced line snapshot. Menu edits never rewrite existing orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub at_ms: i64,
}

/// In-memory order. Mirrors the `orders` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub stall_id: Uuid,
    /// Ticket number shown to the customer, sequential per stall.
    pub number: i32,
    pub customer_name: Option<String>,
    pub table_label: Option<String>,
    pub notes: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub history: Vec<StatusChange>,
    pub version: i32,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl Order {
    /// Timestamp of the entry that moved the order into its current status.
    #[must_use]
    pub fn status_changed_at_ms(&self) -> i64 {
        self.history
            .iter()
            .rev()
            .find(|change| change.status == self.status)
            .map_or(self.updated_at_ms, |change| change.at_ms)
    }
}

// =============================================================================
// STALL STATE
// =============================================================================

/// Per-stall live state. Hydrated on first access, flushed by the
/// persistence task.
pub struct StallState {
    pub stall: Stall,
    pub menu: HashMap<Uuid, MenuItem>,
    pub orders: HashMap<Uuid, Order>,
    /// Order IDs modified since last flush.
    pub dirty_orders: HashSet<Uuid>,
    /// Menu item IDs modified since last flush.
    pub dirty_menu: HashSet<Uuid>,
    /// Menu item IDs deleted in memory but not yet in Postgres.
    pub deleted_menu: HashSet<Uuid>,
    /// Live feed connections: `connection_id` -> sender for outgoing events.
    pub watchers: HashMap<Uuid, mpsc::Sender<OrderEvent>>,
    pub next_order_number: i32,
    /// Unix ms of the last request that touched this stall. Atomic so reads
    /// can bump it under the shared lock.
    pub last_access_ms: AtomicI64,
}

impl StallState {
    #[must_use]
    pub fn new(stall: Stall) -> Self {
        Self {
            stall,
            menu: HashMap::new(),
            orders: HashMap::new(),
            dirty_orders: HashSet::new(),
            dirty_menu: HashSet::new(),
            deleted_menu: HashSet::new(),
            watchers: HashMap::new(),
            next_order_number: 1,
            last_access_ms: AtomicI64::new(now_ms()),
        }
    }

    pub fn touch(&self, at_ms: i64) {
        self.last_access_ms.fetch_max(at_ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn last_access_ms(&self) -> i64 {
        self.last_access_ms.load(Ordering::Relaxed)
    }

    /// True when nothing is waiting to be written to Postgres.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dirty_orders.is_empty() && self.dirty_menu.is_empty() && self.deleted_menu.is_empty()
    }

    /// Queue an order for the persistence task. Demo stalls never persist.
    pub fn mark_order_dirty(&mut self, order_id: Uuid) {
        if !self.stall.is_demo {
            self.dirty_orders.insert(order_id);
        }
    }

    /// Queue a menu item upsert. Demo stalls never persist.
    pub fn mark_item_dirty(&mut self, item_id: Uuid) {
        if !self.stall.is_demo {
            self.dirty_menu.insert(item_id);
        }
    }

    /// Queue a menu item delete, replacing any pending upsert.
    pub fn mark_item_deleted(&mut self, item_id: Uuid) {
        self.dirty_menu.remove(&item_id);
        if !self.stall.is_demo {
            self.deleted_menu.insert(item_id);
        }
    }

    /// Take the next ticket number.
    pub fn allocate_order_number(&mut self) -> i32 {
        let number = self.next_order_number;
        self.next_order_number += 1;
        number
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub stalls: Arc<RwLock<HashMap<Uuid, StallState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self { pool, config: Arc::new(config), stalls: Arc::new(RwLock::new(HashMap::new())) }
    }
}

/// Current wall-clock time in unix milliseconds.
#[must_use]
pub fn now_ms() -> i64 {
    #[allow(clippy::cast_possible_truncation)]
    let ms = (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
    ms
}

// =============================================================================
// TEST HELPERS
// =============================================================================
