use super::*;
use crate::state::test_helpers;

fn new_item(name: &str, category: &str, price_cents: i64) -> NewMenuItem {
    NewMenuItem {
        name: name.into(),
        category: category.into(),
        price_cents,
        available: true,
        ..NewMenuItem::default()
    }
}

#[tokio::test]
async fn create_item_appends_to_category_and_marks_dirty() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let first = create_item(&state, stall_id, new_item("Kopi", "Drinks", 150))
        .await
        .unwrap();
    let second = create_item(&state, stall_id, new_item(" Teh ", " Drinks ", 160))
        .await
        .unwrap();
    let other = create_item(&state, stall_id, new_item("Laksa", "Mains", 600))
        .await
        .unwrap();

    assert_eq!(first.sort_order, 0);
    assert_eq!(second.sort_order, 1);
    assert_eq!(second.name, "Teh");
    assert_eq!(second.category, "Drinks");
    assert_eq!(other.sort_order, 0);

    let stalls = state.stalls.read().await;
    assert_eq!(stalls[&stall_id].dirty_menu.len(), 3);
}

#[tokio::test]
async fn create_item_rejects_blank_name_and_negative_price() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let blank = create_item(&state, stall_id, new_item("   ", "Mains", 100)).await;
    assert!(matches!(blank, Err(MenuError::Invalid(_))));

    let negative = create_item(&state, stall_id, new_item("Rojak", "Mains", -1)).await;
    assert!(matches!(negative, Err(MenuError::Invalid(_))));
}

#[tokio::test]
async fn create_item_caps_price() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;

    let at_cap = create_item(&state, stall_id, new_item("Bird's Nest", "Dessert", MAX_PRICE_CENTS)).await;
    assert!(at_cap.is_ok());

    let huge = create_item(&state, stall_id, new_item("Rojak", "Mains", i64::MAX)).await;
    assert!(matches!(huge, Err(MenuError::Invalid(_))));

    let patch = MenuItemPatch { price_cents: Some(MAX_PRICE_CENTS + 1), ..MenuItemPatch::default() };
    let item_id = at_cap.unwrap().id;
    let result = update_item(&state, stall_id, item_id, patch).await;
    assert!(matches!(result, Err(MenuError::Invalid(_))));
}

#[tokio::test]
async fn list_menu_orders_by_category_then_position() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    for (name, category) in [("Laksa", "Mains"), ("Kopi", "Drinks"), ("Chicken Rice", "Mains")] {
        create_item(&state, stall_id, new_item(name, category, 100))
            .await
            .unwrap();
    }

    let names: Vec<String> = list_menu(&state, stall_id, false)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["Kopi", "Laksa", "Chicken Rice"]);
}

#[tokio::test]
async fn list_menu_available_only_hides_sold_out() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let mut sold_out = new_item("Satay", "Sides", 80);
    sold_out.available = false;
    create_item(&state, stall_id, sold_out).await.unwrap();
    create_item(&state, stall_id, new_item("Otah", "Sides", 120))
        .await
        .unwrap();

    assert_eq!(list_menu(&state, stall_id, false).await.unwrap().len(), 2);
    let available = list_menu(&state, stall_id, true).await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].name, "Otah");
}

#[tokio::test]
async fn update_item_patches_fields_and_bumps_version() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let item = create_item(&state, stall_id, new_item("Kopi", "Drinks", 150))
        .await
        .unwrap();

    let patch = MenuItemPatch { price_cents: Some(170), available: Some(false), ..MenuItemPatch::default() };
    let updated = update_item(&state, stall_id, item.id, patch).await.unwrap();

    assert_eq!(updated.name, "Kopi");
    assert_eq!(updated.price_cents, 170);
    assert!(!updated.available);
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn update_item_validates_before_mutating() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let item = create_item(&state, stall_id, new_item("Kopi", "Drinks", 150))
        .await
        .unwrap();

    let patch = MenuItemPatch { name: Some(String::new()), price_cents: Some(999), ..MenuItemPatch::default() };
    assert!(matches!(update_item(&state, stall_id, item.id, patch).await, Err(MenuError::Invalid(_))));

    let stalls = state.stalls.read().await;
    assert_eq!(stalls[&stall_id].menu[&item.id].price_cents, 150);
}

#[tokio::test]
async fn update_item_not_found() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let result = update_item(&state, stall_id, Uuid::new_v4(), MenuItemPatch::default()).await;
    assert!(matches!(result, Err(MenuError::NotFound(_))));
}

#[tokio::test]
async fn delete_item_on_demo_stall_stays_in_memory() {
    let state = test_helpers::test_app_state();
    let mut stall = test_helpers::dummy_stall();
    stall.is_demo = true;
    let item = test_helpers::dummy_item(stall.id, "Kopi", 150);
    let item_id = item.id;
    let stall_id = test_helpers::seed_stall_with(&state, stall, vec![item]).await;

    delete_item(&state, stall_id, item_id).await.unwrap();
    let stalls = state.stalls.read().await;
    assert!(stalls[&stall_id].menu.is_empty());
    assert!(stalls[&stall_id].deleted_menu.is_empty());
}

#[tokio::test]
async fn delete_item_queues_tombstone_and_drops_pending_upsert() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let item = create_item(&state, stall_id, new_item("Kopi", "Drinks", 150)).await.unwrap();

    delete_item(&state, stall_id, item.id).await.unwrap();

    let stalls = state.stalls.read().await;
    assert!(!stalls[&stall_id].menu.contains_key(&item.id));
    assert!(!stalls[&stall_id].dirty_menu.contains(&item.id));
    assert!(stalls[&stall_id].deleted_menu.contains(&item.id));
}

#[tokio::test]
async fn delete_item_not_found_never_touches_database() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let result = delete_item(&state, stall_id, Uuid::new_v4()).await;
    assert!(matches!(result, Err(MenuError::NotFound(_))));
}

#[test]
fn starter_menu_positions_items_within_categories() {
    let stall_id = Uuid::new_v4();
    let menu = starter_menu(stall_id);
    assert!(!menu.is_empty());
    assert!(menu.iter().all(|item| item.stall_id == stall_id && item.available));

    let drinks: Vec<i32> = menu
        .iter()
        .filter(|item| item.category == "Drinks")
        .map(|item| item.sort_order)
        .collect();
    assert_eq!(drinks, vec![0, 1]);
}
