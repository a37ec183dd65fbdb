//! Menu service — stall menu CRUD.
//!
//! Creates, patches and deletes are applied in memory and flushed by the
//! persistence task. A delete leaves a tombstone that is written in the same
//! transaction as any pending upserts, and always after them, so a removed
//! dish cannot come back from an in-flight flush.

use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::event::OrderEvent;
use crate::services::feed;
use crate::state::{AppState, MenuItem};

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("stall not loaded: {0}")]
    StallNotLoaded(Uuid),
    #[error("menu item not found: {0}")]
    NotFound(Uuid),
    #[error("invalid menu item: {0}")]
    Invalid(&'static str),
}

/// Highest accepted price: 1,000,000.00 in cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMenuItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price_cents: i64,
    #[serde(default = "default_available")]
    pub available: bool,
    pub image_url: Option<String>,
}

fn default_available() -> bool {
    true
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MenuItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub available: Option<bool>,
    pub image_url: Option<String>,
    pub sort_order: Option<i32>,
}

fn validate_name(name: &str) -> Result<String, MenuError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(MenuError::Invalid("name must not be blank"));
    }
    Ok(trimmed.to_owned())
}

fn validate_price(price_cents: i64) -> Result<i64, MenuError> {
    if price_cents < 0 {
        return Err(MenuError::Invalid("price must not be negative"));
    }
    if price_cents > MAX_PRICE_CENTS {
        return Err(MenuError::Invalid("price is too large"));
    }
    Ok(price_cents)
}

/// Sort key used everywhere the menu is listed.
fn menu_order(a: &MenuItem, b: &MenuItem) -> std::cmp::Ordering {
    a.category
        .cmp(&b.category)
        .then(a.sort_order.cmp(&b.sort_order))
        .then_with(|| a.name.cmp(&b.name))
}

/// List a stall's menu in display order.
///
/// # Errors
///
/// Returns `StallNotLoaded` if the stall isn't in memory.
pub async fn list_menu(state: &AppState, stall_id: Uuid, available_only: bool) -> Result<Vec<MenuItem>, MenuError> {
    let stalls = state.stalls.read().await;
    let stall_state = stalls
        .get(&stall_id)
        .ok_or(MenuError::StallNotLoaded(stall_id))?;

    let mut items: Vec<MenuItem> = stall_state
        .menu
        .values()
        .filter(|item| !available_only || item.available)
        .cloned()
        .collect();
    items.sort_by(menu_order);
    Ok(items)
}

/// Add an item at the end of its category.
///
/// # Errors
///
/// Returns `Invalid` for a blank name or a price outside `0..=MAX_PRICE_CENTS`.
pub async fn create_item(state: &AppState, stall_id: Uuid, input: NewMenuItem) -> Result<MenuItem, MenuError> {
    let name = validate_name(&input.name)?;
    let price_cents = validate_price(input.price_cents)?;
    let category = input.category.trim().to_owned();

    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(MenuError::StallNotLoaded(stall_id))?;

    let sort_order = stall_state
        .menu
        .values()
        .filter(|item| item.category == category)
        .map(|item| item.sort_order + 1)
        .max()
        .unwrap_or(0);

    let item = MenuItem {
        id: Uuid::new_v4(),
        stall_id,
        name,
        description: input.description.trim().to_owned(),
        category,
        price_cents,
        available: input.available,
        image_url: input.image_url.filter(|url| !url.trim().is_empty()),
        sort_order,
        version: 1,
    };

    stall_state.mark_item_dirty(item.id);
    stall_state.menu.insert(item.id, item.clone());
    feed::deliver(&mut stall_state.watchers, &OrderEvent::MenuChanged { item_id: item.id });

    info!(%stall_id, item_id = %item.id, name = %item.name, "menu item created");
    Ok(item)
}

/// Apply a partial update and bump the item version.
///
/// # Errors
///
/// Returns `NotFound` or `Invalid`.
pub async fn update_item(
    state: &AppState,
    stall_id: Uuid,
    item_id: Uuid,
    patch: MenuItemPatch,
) -> Result<MenuItem, MenuError> {
    let name = patch.name.as_deref().map(validate_name).transpose()?;
    let price_cents = patch.price_cents.map(validate_price).transpose()?;

    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(MenuError::StallNotLoaded(stall_id))?;
    let item = stall_state
        .menu
        .get_mut(&item_id)
        .ok_or(MenuError::NotFound(item_id))?;

    if let Some(name) = name {
        item.name = name;
    }
    if let Some(price_cents) = price_cents {
        item.price_cents = price_cents;
    }
    if let Some(description) = patch.description {
        item.description = description.trim().to_owned();
    }
    if let Some(category) = patch.category {
        item.category = category.trim().to_owned();
    }
    if let Some(available) = patch.available {
        item.available = available;
    }
    if let Some(image_url) = patch.image_url {
        item.image_url = Some(image_url).filter(|url| !url.trim().is_empty());
    }
    if let Some(sort_order) = patch.sort_order {
        item.sort_order = sort_order;
    }
    item.version += 1;

    let updated = item.clone();
    stall_state.mark_item_dirty(item_id);
    feed::deliver(&mut stall_state.watchers, &OrderEvent::MenuChanged { item_id });
    Ok(updated)
}

/// Remove an item from the menu and queue the delete for persistence.
///
/// # Errors
///
/// Returns `StallNotLoaded` or `NotFound`.
pub async fn delete_item(state: &AppState, stall_id: Uuid, item_id: Uuid) -> Result<(), MenuError> {
    let mut stalls = state.stalls.write().await;
    let stall_state = stalls
        .get_mut(&stall_id)
        .ok_or(MenuError::StallNotLoaded(stall_id))?;
    if stall_state.menu.remove(&item_id).is_none() {
        return Err(MenuError::NotFound(item_id));
    }
    stall_state.mark_item_deleted(item_id);
    feed::deliver(&mut stall_state.watchers, &OrderEvent::MenuChanged { item_id });

    info!(%stall_id, %item_id, "menu item deleted");
    Ok(())
}

/// Default dishes for a newly registered stall.
#[must_use]
pub fn starter_menu(stall_id: Uuid) -> Vec<MenuItem> {
    const STARTER: [(&str, &str, &str, i64); 6] = [
        ("Chicken Rice", "Poached chicken, fragrant rice, chilli", "Mains", 450),
        ("Char Kway Teow", "Wok-fried flat noodles with cockles", "Mains", 550),
        ("Laksa", "Spicy coconut noodle soup", "Mains", 600),
        ("Fried Wonton", "Six pieces", "Sides", 300),
        ("Kopi", "Local coffee with condensed milk", "Drinks", 150),
        ("Teh Peng", "Iced milk tea", "Drinks", 180),
    ];

    let mut items = Vec::with_capacity(STARTER.len());
    let mut per_category: std::collections::HashMap<&str, i32> = std::collections::HashMap::new();
    for (name, description, category, price_cents) in STARTER {
        let slot = per_category.entry(category).or_insert(0);
        items.push(MenuItem {
            id: Uuid::new_v4(),
            stall_id,
            name: name.to_owned(),
            description: description.to_owned(),
            category: category.to_owned(),
            price_cents,
            available: true,
            image_url: None,
            sort_order: *slot,
            version: 1,
        });
        *slot += 1;
    }
    items
}

/// Delete one menu row.
pub(crate) async fn delete_item_row(conn: &mut sqlx::PgConnection, item_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM menu_items WHERE id = $1")
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Upsert one menu row.
pub(crate) async fn upsert_item(conn: &mut sqlx::PgConnection, item: &MenuItem) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO menu_items (id, stall_id, name, description, category, price_cents, available, image_url, sort_order, version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET \
             name = EXCLUDED.name, description = EXCLUDED.description, category = EXCLUDED.category, \
             price_cents = EXCLUDED.price_cents, available = EXCLUDED.available, image_url = EXCLUDED.image_url, \
             sort_order = EXCLUDED.sort_order, version = EXCLUDED.version",
    )
    .bind(item.id)
    .bind(item.stall_id)
    .bind(&item.name)
    .bind(&item.description)
    .bind(&item.category)
    .bind(item.price_cents)
    .bind(item.available)
    .bind(&item.image_url)
    .bind(item.sort_order)
    .bind(item.version)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "menu_test.rs"]
mod tests;
