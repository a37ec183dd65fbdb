use super::*;
use crate::state::{OrderLine, test_helpers};

/// 2026-10-18T12:00:00Z
const NOW_MS: i64 = 1_792_324_800_000;
const DAY_MS: i64 = 86_400_000;

fn order_with_line(status: OrderStatus, at_ms: i64, item_id: Uuid, name: &str, quantity: u32, unit: i64) -> Order {
    let mut order = test_helpers::dummy_order(Uuid::nil(), status, unit * i64::from(quantity), at_ms);
    order.lines = vec![OrderLine {
        item_id,
        name: name.into(),
        unit_price_cents: unit,
        quantity,
        line_total_cents: unit * i64::from(quantity),
    }];
    order
}

// =============================================================================
// dates
// =============================================================================

#[test]
fn utc_date_buckets_by_utc_day() {
    assert_eq!(utc_date(NOW_MS).to_string(), "2026-10-18");
    assert_eq!(utc_date(NOW_MS - 12 * 3_600_000).to_string(), "2026-10-18");
    assert_eq!(utc_date(NOW_MS - 12 * 3_600_000 - 1).to_string(), "2026-10-17");
}

#[test]
fn parse_date_accepts_iso_dates() {
    assert_eq!(parse_date("2026-10-18").unwrap(), utc_date(NOW_MS));
}

#[test]
fn parse_date_rejects_malformed_input() {
    for raw in ["", "2026-10", "2026/10/18", "26-10-18", "2026-13-01", "2026-02-30", "2026-1-5"] {
        assert!(matches!(parse_date(raw), Err(SalesError::InvalidDate(_))), "{raw:?} should be rejected");
    }
}

// =============================================================================
// summarize
// =============================================================================

#[test]
fn summarize_empty_window_is_zero_filled() {
    let summary = summarize(&Vec::<Order>::new(), NOW_MS, 7);
    assert_eq!(summary.days, 7);
    assert_eq!(summary.daily.len(), 7);
    assert_eq!(summary.daily[0].date, "2026-10-12");
    assert_eq!(summary.daily[6].date, "2026-10-18");
    assert!(summary.daily.iter().all(|d| d.orders == 0 && d.revenue_cents == 0));
    assert_eq!(summary.average_order_cents, 0);
    assert_eq!(summary.status_counts.len(), OrderStatus::ALL.len());
    assert!(summary.top_items.is_empty());
}

#[test]
fn summarize_counts_revenue_only_for_completed_orders() {
    let rice = Uuid::new_v4();
    let orders = vec![
        order_with_line(OrderStatus::Completed, NOW_MS, rice, "Chicken Rice", 2, 450),
        order_with_line(OrderStatus::Completed, NOW_MS - DAY_MS, rice, "Chicken Rice", 1, 450),
        order_with_line(OrderStatus::Cancelled, NOW_MS, rice, "Chicken Rice", 5, 450),
        order_with_line(OrderStatus::Preparing, NOW_MS, rice, "Chicken Rice", 1, 450),
    ];

    let summary = summarize(&orders, NOW_MS, 7);
    assert_eq!(summary.revenue_cents, 1350);
    assert_eq!(summary.completed_orders, 2);
    assert_eq!(summary.cancelled_orders, 1);
    assert_eq!(summary.active_orders, 1);
    assert_eq!(summary.average_order_cents, 675);

    let today = summary.daily.last().unwrap();
    assert_eq!(today.orders, 3);
    assert_eq!(today.revenue_cents, 900);
    assert_eq!(summary.daily[5].revenue_cents, 450);

    assert_eq!(summary.top_items.len(), 1);
    assert_eq!(summary.top_items[0].quantity, 3);
}

#[test]
fn summarize_excludes_orders_outside_window() {
    let item = Uuid::new_v4();
    let orders = vec![
        order_with_line(OrderStatus::Completed, NOW_MS - 7 * DAY_MS, item, "Laksa", 1, 600),
        order_with_line(OrderStatus::Completed, NOW_MS + DAY_MS, item, "Laksa", 1, 600),
    ];
    let summary = summarize(&orders, NOW_MS, 7);
    assert_eq!(summary.revenue_cents, 0);
    assert_eq!(summary.status_counts.iter().map(|c| c.count).sum::<u32>(), 0);
}

#[test]
fn summarize_clamps_days() {
    assert_eq!(summarize(&Vec::<Order>::new(), NOW_MS, 0).days, 1);
    assert_eq!(summarize(&Vec::<Order>::new(), NOW_MS, 1_000).daily.len(), 90);
}

#[test]
fn top_items_rank_by_quantity_then_name() {
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let orders = vec![
        order_with_line(OrderStatus::Completed, NOW_MS, a, "Kopi", 2, 150),
        order_with_line(OrderStatus::Completed, NOW_MS, b, "Bandung", 2, 200),
        order_with_line(OrderStatus::Completed, NOW_MS, c, "Laksa", 5, 600),
    ];
    let names: Vec<String> = summarize(&orders, NOW_MS, 1)
        .top_items
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(names, vec!["Laksa", "Bandung", "Kopi"]);
}

#[test]
fn top_items_are_capped() {
    let orders: Vec<Order> = (0..8_u32)
        .map(|i| order_with_line(OrderStatus::Completed, NOW_MS, Uuid::new_v4(), &format!("Dish {i}"), i + 1, 100))
        .collect();
    let summary = summarize(&orders, NOW_MS, 1);
    assert_eq!(summary.top_items.len(), TOP_ITEM_LIMIT);
    assert_eq!(summary.top_items[0].name, "Dish 7");
}

// =============================================================================
// billing_statement
// =============================================================================

#[test]
fn billing_statement_uses_completion_date() {
    let item = Uuid::new_v4();
    let mut late = order_with_line(OrderStatus::Completed, NOW_MS - DAY_MS, item, "Laksa", 1, 600);
    late.history.last_mut().unwrap().at_ms = NOW_MS;
    let early = order_with_line(OrderStatus::Completed, NOW_MS - DAY_MS, item, "Laksa", 2, 600);
    let cancelled = order_with_line(OrderStatus::Cancelled, NOW_MS, item, "Laksa", 1, 600);

    let today = utc_date(NOW_MS);
    let statement = billing_statement([&late, &early, &cancelled], today, today).unwrap();
    assert_eq!(statement.order_count, 1);
    assert_eq!(statement.total_cents, 600);
    assert_eq!(statement.lines[0].order_id, late.id);
    assert_eq!(statement.from, "2026-10-18");

    let both = billing_statement([&late, &early], today - Duration::days(1), today).unwrap();
    assert_eq!(both.order_count, 2);
    assert_eq!(both.total_cents, 1800);
    assert_eq!(both.lines[0].order_id, early.id);
}

#[test]
fn totals_saturate_instead_of_overflowing() {
    let item = Uuid::new_v4();
    let orders = vec![
        order_with_line(OrderStatus::Completed, NOW_MS, item, "Abalone", 1, i64::MAX - 1),
        order_with_line(OrderStatus::Completed, NOW_MS, item, "Abalone", 1, i64::MAX - 1),
    ];

    let summary = summarize(&orders, NOW_MS, 7);
    assert_eq!(summary.revenue_cents, i64::MAX);
    assert_eq!(summary.top_items[0].revenue_cents, i64::MAX);

    let today = utc_date(NOW_MS);
    let statement = billing_statement(&orders, today, today).unwrap();
    assert_eq!(statement.total_cents, i64::MAX);
}

#[test]
fn billing_statement_rejects_inverted_range() {
    let today = utc_date(NOW_MS);
    let err = billing_statement(&Vec::<Order>::new(), today, today - Duration::days(1)).unwrap_err();
    assert!(matches!(err, SalesError::InvalidRange { .. }));
}

// =============================================================================
// stall-scoped wrappers
// =============================================================================

#[tokio::test]
async fn stall_summary_reads_loaded_orders() {
    let state = test_helpers::test_app_state();
    let stall_id = test_helpers::seed_stall(&state).await;
    let order = order_with_line(OrderStatus::Completed, NOW_MS, Uuid::new_v4(), "Laksa", 2, 600);
    test_helpers::seed_orders(&state, stall_id, vec![order]).await;

    let summary = stall_summary(&state, stall_id, NOW_MS, 7).await.unwrap();
    assert_eq!(summary.revenue_cents, 1200);
    assert_eq!(summary.completed_orders, 1);
}

#[tokio::test]
async fn stall_billing_unknown_stall_is_not_loaded() {
    let state = test_helpers::test_app_state();
    let today = utc_date(NOW_MS);
    let err = stall_billing(&state, Uuid::new_v4(), today, today).await.unwrap_err();
    assert!(matches!(err, SalesError::StallNotLoaded(_)));
}
