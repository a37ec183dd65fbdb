use super::*;
use crate::state::test_helpers;

const NOW_MS: i64 = 1_792_324_800_000;

// =============================================================================
// hydrate
// =============================================================================

#[test]
fn hydrate_continues_numbering_after_highest_ticket() {
    let stall = test_helpers::dummy_stall();
    let mut order = test_helpers::dummy_order(stall.id, OrderStatus::Pending, 450, NOW_MS);
    order.number = 7;
    let ss = hydrate(stall, Vec::new(), vec![order], 3, NOW_MS);
    assert_eq!(ss.next_order_number, 8);
    assert_eq!(ss.orders.len(), 1);
}

#[test]
fn hydrate_uses_max_number_beyond_loaded_window() {
    let stall = test_helpers::dummy_stall();
    let ss = hydrate(stall, Vec::new(), Vec::new(), 41, NOW_MS);
    assert_eq!(ss.next_order_number, 42);
    assert!(ss.orders.is_empty());
}

#[test]
fn hydrate_real_stall_starts_clean() {
    let stall = test_helpers::dummy_stall();
    let menu = vec![test_helpers::dummy_item(stall.id, "Laksa", 600)];
    let ss = hydrate(stall, menu, Vec::new(), 0, NOW_MS);
    assert_eq!(ss.menu.len(), 1);
    assert_eq!(ss.next_order_number, 1);
    assert!(ss.dirty_orders.is_empty());
    assert!(ss.dirty_menu.is_empty());
}

#[test]
fn hydrate_demo_stall_synthesizes_orders() {
    let mut stall = test_helpers::dummy_stall();
    stall.is_demo = true;
    let menu = crate::services::menu::starter_menu(stall.id);
    let ignored = test_helpers::dummy_order(stall.id, OrderStatus::Pending, 100, NOW_MS);

    let ss = hydrate(stall, menu, vec![ignored.clone()], 0, NOW_MS);
    assert_eq!(ss.orders.len(), demo::DEFAULT_DEMO_ORDER_COUNT);
    assert!(!ss.orders.contains_key(&ignored.id));
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let expected_next = demo::DEFAULT_DEMO_ORDER_COUNT as i32 + 1;
    assert_eq!(ss.next_order_number, expected_next);
}

// =============================================================================
// ownership and links
// =============================================================================

#[test]
fn ensure_owner_accepts_owner() {
    let stall = test_helpers::dummy_stall();
    assert!(ensure_owner(&stall, stall.owner_id).is_ok());
}

#[test]
fn ensure_owner_rejects_other_user() {
    let stall = test_helpers::dummy_stall();
    assert!(matches!(ensure_owner(&stall, Uuid::new_v4()), Err(StallError::Forbidden)));
}

#[test]
fn storefront_url_joins_base_and_id() {
    let config = AppConfig { public_base_url: "https://hawker.example/".into(), ..AppConfig::default() };
    let id = Uuid::nil();
    assert_eq!(storefront_url(&config, id), format!("https://hawker.example/s/{id}"));
}

// =============================================================================
// apply_patch
// =============================================================================

#[test]
fn apply_patch_updates_given_fields_only() {
    let mut stall = test_helpers::dummy_stall();
    let original_location = stall.location.clone();
    let patch = StallPatch { name: Some("  Ah Seng Braised Duck ".into()), is_open: Some(false), ..StallPatch::default() };
    apply_patch(&mut stall, patch).unwrap();
    assert_eq!(stall.name, "Ah Seng Braised Duck");
    assert!(!stall.is_open);
    assert_eq!(stall.location, original_location);
}

#[test]
fn apply_patch_rejects_blank_name_without_changes() {
    let mut stall = test_helpers::dummy_stall();
    let before = stall.name.clone();
    let patch = StallPatch { name: Some("   ".into()), is_open: Some(false), ..StallPatch::default() };
    assert!(matches!(apply_patch(&mut stall, patch), Err(StallError::Invalid(_))));
    assert_eq!(stall.name, before);
    assert!(stall.is_open);
}

// =============================================================================
// in-memory queries
// =============================================================================

#[tokio::test]
async fn get_stall_returns_loaded_profile() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let stall = get_stall(&state, stall_id).await.unwrap();
    assert_eq!(stall.id, stall_id);
}

#[tokio::test]
async fn get_stall_unknown_is_not_found() {
    let state = test_helpers::test_app_state();
    assert!(matches!(get_stall(&state, Uuid::new_v4()).await, Err(StallError::NotFound(_))));
}

#[tokio::test]
async fn ensure_loaded_short_circuits_for_loaded_stall() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    assert!(ensure_loaded(&state, stall_id).await.is_ok());
}

#[tokio::test]
async fn find_stall_for_owner_prefers_loaded_state() {
    let state = test_helpers::test_app_state();
    let stall = test_helpers::dummy_stall();
    let owner_id = stall.owner_id;
    let stall_id = test_helpers::seed_stall_with(&state, stall, Vec::new()).await;
    assert_eq!(find_stall_for_owner(&state, owner_id).await.unwrap(), Some(stall_id));
}

#[tokio::test]
async fn update_profile_demo_stall_stays_in_memory() {
    let state = test_helpers::test_app_state();
    let mut stall = test_helpers::dummy_stall();
    stall.is_demo = true;
    let stall_id = test_helpers::seed_stall_with(&state, stall, Vec::new()).await;

    let patch = StallPatch { location: Some("Lau Pa Sat #02".into()), ..StallPatch::default() };
    let updated = update_profile(&state, stall_id, patch).await.unwrap();
    assert_eq!(updated.location, "Lau Pa Sat #02");
    assert_eq!(state.stalls.read().await[&stall_id].stall.location, "Lau Pa Sat #02");
}

#[tokio::test]
async fn update_profile_notifies_feed_watchers() {
    let state = test_helpers::test_app_state();
    let mut stall = test_helpers::dummy_stall();
    stall.is_demo = true;
    let stall_id = test_helpers::seed_stall_with(&state, stall, Vec::new()).await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    feed::subscribe(&state, stall_id, Uuid::new_v4(), tx).await.unwrap();

    let patch = StallPatch { is_open: Some(false), ..StallPatch::default() };
    update_profile(&state, stall_id, patch).await.unwrap();

    match rx.try_recv() {
        Ok(OrderEvent::StallUpdated { stall }) => assert!(!stall.is_open),
        other => panic!("expected stall_updated, got {other:?}"),
    }
}

#[tokio::test]
async fn update_profile_failed_write_leaves_memory_and_watchers_untouched() {
    let state = test_helpers::test_app_state();
    let stall = test_helpers::dummy_stall();
    let stall_id = test_helpers::seed_stall_with(&state, stall, Vec::new()).await;
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    feed::subscribe(&state, stall_id, Uuid::new_v4(), tx).await.unwrap();
    assert!(state.stalls.read().await[&stall_id].stall.is_open);

    // The test pool has no database behind it, so the write fails.
    let patch = StallPatch { is_open: Some(false), ..StallPatch::default() };
    let result = update_profile(&state, stall_id, patch).await;
    assert!(matches!(result, Err(StallError::Database(_))));

    assert!(state.stalls.read().await[&stall_id].stall.is_open);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn update_profile_validates_before_writing() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let patch = StallPatch { name: Some("  ".into()), ..StallPatch::default() };
    let result = update_profile(&state, stall_id, patch).await;
    assert!(matches!(result, Err(StallError::Invalid(_))));
}

// =============================================================================
// evict_idle
// =============================================================================

#[tokio::test]
async fn evict_idle_trims_only_old_flushed_terminal_orders() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let old = NOW_MS - 31 * DAY_MS;
    let stale = test_helpers::dummy_order(stall_id, OrderStatus::Completed, 450, old);
    let unflushed = test_helpers::dummy_order(stall_id, OrderStatus::Cancelled, 450, old);
    let forgotten = test_helpers::dummy_order(stall_id, OrderStatus::Preparing, 450, old);
    let recent = test_helpers::dummy_order(stall_id, OrderStatus::Completed, 450, NOW_MS - DAY_MS);
    let (stale_id, unflushed_id) = (stale.id, unflushed.id);
    test_helpers::seed_orders(&state, stall_id, vec![stale, unflushed, forgotten, recent]).await;
    {
        let mut stalls = state.stalls.write().await;
        let ss = stalls.get_mut(&stall_id).unwrap();
        ss.mark_order_dirty(unflushed_id);
        ss.touch(NOW_MS);
    }

    assert_eq!(evict_idle(&state, NOW_MS).await, 0);

    let stalls = state.stalls.read().await;
    let orders = &stalls[&stall_id].orders;
    assert_eq!(orders.len(), 3);
    assert!(!orders.contains_key(&stale_id));
    assert!(orders.contains_key(&unflushed_id));
}

#[tokio::test]
async fn evict_idle_drops_only_idle_clean_unwatched_stalls() {
    let state = test_helpers::test_app_state();
    let now = now_ms() + 2 * 900_000;

    let idle = test_helpers::seed_stall(&state).await;
    let watched = test_helpers::seed_stall(&state).await;
    let (tx, _rx) = tokio::sync::mpsc::channel(4);
    feed::subscribe(&state, watched, Uuid::new_v4(), tx).await.unwrap();
    let dirty = test_helpers::seed_stall(&state).await;
    let recent = test_helpers::seed_stall(&state).await;
    {
        let mut stalls = state.stalls.write().await;
        stalls.get_mut(&dirty).unwrap().mark_item_deleted(Uuid::new_v4());
        stalls[&recent].touch(now - 1_000);
    }

    assert_eq!(evict_idle(&state, now).await, 1);

    let stalls = state.stalls.read().await;
    assert!(!stalls.contains_key(&idle));
    assert!(stalls.contains_key(&watched));
    assert!(stalls.contains_key(&dirty));
    assert!(stalls.contains_key(&recent));
}

#[tokio::test]
async fn evict_idle_disabled_when_idle_secs_is_zero() {
    let pool = test_helpers::test_app_state().pool;
    let state = AppState::new(pool, AppConfig { stall_idle_secs: 0, ..AppConfig::default() });
    let stall_id = test_helpers::seed_stall(&state).await;

    assert_eq!(evict_idle(&state, i64::MAX).await, 0);
    assert!(state.stalls.read().await.contains_key(&stall_id));
}

#[tokio::test]
async fn ensure_loaded_touches_resident_stall() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    state.stalls.read().await[&stall_id]
        .last_access_ms
        .store(0, std::sync::atomic::Ordering::Relaxed);

    ensure_loaded(&state, stall_id).await.unwrap();

    assert!(state.stalls.read().await[&stall_id].last_access_ms() > 0);
}
