//! Cart pricing — validates customer cart lines against a stall menu.
//!
//! Lines for the same item are merged (first-seen order is kept) before
//! validation, so `[{a,1},{b,1},{a,2}]` prices as `a x3, b x1`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::{MenuItem, OrderLine};

pub const MAX_QUANTITY: u32 = 99;
pub const MAX_DISTINCT_ITEMS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedCart {
    pub lines: Vec<OrderLine>,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("cart is empty")]
    Empty,
    #[error("invalid quantity {quantity} for item {item_id} (allowed 1..={MAX_QUANTITY})")]
    InvalidQuantity { item_id: Uuid, quantity: u32 },
    #[error("too many distinct items: {0} (max {MAX_DISTINCT_ITEMS})")]
    TooManyLines(usize),
    #[error("unknown menu item: {0}")]
    UnknownItem(Uuid),
    #[error("menu item unavailable: {0}")]
    Unavailable(Uuid),
    #[error("cart total too large")]
    TotalTooLarge,
}

/// Merge duplicate item lines, keeping first-seen order.
#[must_use]
pub fn merge_lines(lines: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for line in lines {
        if let Some(&pos) = index.get(&line.item_id) {
            merged[pos].quantity = merged[pos].quantity.saturating_add(line.quantity);
        } else {
            index.insert(line.item_id, merged.len());
            merged.push(*line);
        }
    }
    merged
}

/// Price a cart against a menu.
///
/// # Errors
///
/// Returns a `CartError` for empty carts, bad quantities, unknown or
/// unavailable items, or a total that does not fit in `i64` cents.
pub fn price_cart(menu: &HashMap<Uuid, MenuItem>, lines: &[CartLine]) -> Result<PricedCart, CartError> {
    if lines.is_empty() {
        return Err(CartError::Empty);
    }

    let merged = merge_lines(lines);
    if merged.len() > MAX_DISTINCT_ITEMS {
        return Err(CartError::TooManyLines(merged.len()));
    }

    let mut priced = Vec::with_capacity(merged.len());
    let mut total_cents = 0_i64;
    for line in merged {
        if line.quantity == 0 || line.quantity > MAX_QUANTITY {
            return Err(CartError::InvalidQuantity { item_id: line.item_id, quantity: line.quantity });
        }
        let item = menu
            .get(&line.item_id)
            .ok_or(CartError::UnknownItem(line.item_id))?;
        if !item.available {
            return Err(CartError::Unavailable(line.item_id));
        }

        let line_total_cents = item
            .price_cents
            .checked_mul(i64::from(line.quantity))
            .ok_or(CartError::TotalTooLarge)?;
        total_cents = total_cents
            .checked_add(line_total_cents)
            .ok_or(CartError::TotalTooLarge)?;
        priced.push(OrderLine {
            item_id: item.id,
            name: item.name.clone(),
            unit_price_cents: item.price_cents,
            quantity: line.quantity,
            line_total_cents,
        });
    }

    Ok(PricedCart { lines: priced, total_cents })
}

#[cfg(test)]
#[path = "cart_test.rs"]
mod tests;
