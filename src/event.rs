//! Live feed events pushed to stall owners.
//!
//! Events are serialized as internally tagged JSON, e.g.
//! `{"type":"order_updated","order":{...}}`.

use serde::Serialize;
use uuid::Uuid;

use crate::state::{Order, Stall};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    /// Sent once when a feed connection opens.
    Snapshot { orders: Vec<Order> },
    OrderCreated { order: Order },
    OrderUpdated { order: Order },
    MenuChanged { item_id: Uuid },
    /// Profile edits, including opening and closing the stall.
    StallUpdated { stall: Stall },
}

impl OrderEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::OrderCreated { .. } => "order_created",
            Self::OrderUpdated { .. } => "order_updated",
            Self::MenuChanged { .. } => "menu_changed",
            Self::StallUpdated { .. } => "stall_updated",
        }
    }
}
