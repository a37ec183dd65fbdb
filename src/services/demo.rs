//! Demo data — deterministic mock orders and a live kitchen simulator.
//!
//! DESIGN
//! ======
//! Demo stalls never read or write orders in Postgres. On hydration their
//! order book is synthesized from an RNG seeded by the stall id, so the same
//! demo account always sees the same history. While loaded, a background
//! simulator advances orders through the pipeline and places new ones so
//! the dashboard and live feed have something to show.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::{Builder, Uuid};

use crate::services::cart::{self, CartLine};
use crate::services::order::{self, NewOrder};
use crate::state::{AppState, MenuItem, Order, OrderLine, StatusChange, now_ms};
use crate::status::OrderStatus;

pub const DEMO_EMAIL_DOMAIN: &str = "demo.hawker.app";
pub const DEFAULT_DEMO_ORDER_COUNT: usize = 60;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;
const RECENT_ORDERS: usize = 4;
const NEW_ORDER_PROBABILITY: f64 = 0.5;

const CUSTOMER_NAMES: [&str; 8] = ["Mei", "Raj", "Siti", "Jun", "Aisha", "Wei Ling", "Kumar", "Hui Min"];

/// Offsets from placement at which each forward status is reached.
const PREPARING_AFTER_MS: i64 = 3 * MINUTE_MS;
const READY_AFTER_MS: i64 = 12 * MINUTE_MS;
const COMPLETED_AFTER_MS: i64 = 18 * MINUTE_MS;
const CANCELLED_AFTER_MS: i64 = 2 * MINUTE_MS;

#[must_use]
pub fn is_demo_email(email: &str) -> bool {
    email
        .rsplit_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.eq_ignore_ascii_case(DEMO_EMAIL_DOMAIN))
}

/// RNG seeded from the stall id.
#[must_use]
pub fn stall_rng(stall_id: Uuid) -> StdRng {
    let (hi, lo) = stall_id.as_u64_pair();
    StdRng::seed_from_u64(hi ^ lo.rotate_left(32))
}

/// Synthesize `count` orders spread over the seven days before `now_ms`.
///
/// Output is deterministic for identical inputs. Orders older than an hour
/// are terminal; the most recent few are still moving through the kitchen.
#[must_use]
pub fn generate_orders(stall_id: Uuid, menu: &[MenuItem], now_ms: i64, count: usize) -> Vec<Order> {
    let mut items: Vec<&MenuItem> = menu.iter().filter(|item| item.available).collect();
    if items.is_empty() || count == 0 {
        return Vec::new();
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));

    let mut rng = stall_rng(stall_id);

    let mut ages: Vec<i64> = (0..count)
        .map(|i| {
            if i < RECENT_ORDERS {
                rng.random_range(0..45 * MINUTE_MS)
            } else {
                rng.random_range(HOUR_MS..7 * DAY_MS)
            }
        })
        .collect();
    // Oldest first so ticket numbers follow placement time.
    ages.sort_unstable_by(|a, b| b.cmp(a));

    let mut orders = Vec::with_capacity(count);
    for (idx, age_ms) in ages.into_iter().enumerate() {
        let created_at_ms = now_ms - age_ms;
        let lines = random_lines(&mut rng, &items);
        let total_cents = lines
            .iter()
            .fold(0_i64, |acc, line| acc.saturating_add(line.line_total_cents));

        let status = if age_ms >= HOUR_MS {
            if rng.random_range(0..10) == 0 { OrderStatus::Cancelled } else { OrderStatus::Completed }
        } else if age_ms < PREPARING_AFTER_MS {
            OrderStatus::Pending
        } else if age_ms < READY_AFTER_MS {
            OrderStatus::Preparing
        } else {
            OrderStatus::Ready
        };
        let history = history_for(status, created_at_ms, now_ms);
        let updated_at_ms = history.last().map_or(created_at_ms, |change| change.at_ms);

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let number = (idx + 1) as i32;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let version = history.len() as i32;
        let id = Builder::from_random_bytes(rng.random()).into_uuid();
        let name_idx = rng.random_range(0..CUSTOMER_NAMES.len());
        orders.push(Order {
            id,
            stall_id,
            number,
            customer_name: Some(CUSTOMER_NAMES[name_idx].to_owned()),
            table_label: Some(format!("T{}", rng.random_range(1..=24))),
            notes: None,
            lines,
            total_cents,
            status,
            history,
            version,
            created_at_ms,
            updated_at_ms,
        });
    }
    orders
}

fn random_lines<R: Rng>(rng: &mut R, items: &[&MenuItem]) -> Vec<OrderLine> {
    let distinct = rng.random_range(1..=items.len().min(3));
    let mut picked: Vec<usize> = Vec::with_capacity(distinct);
    while picked.len() < distinct {
        let idx = rng.random_range(0..items.len());
        if !picked.contains(&idx) {
            picked.push(idx);
        }
    }
    picked
        .into_iter()
        .map(|idx| {
            let item = items[idx];
            let quantity: u32 = rng.random_range(1..=3);
            OrderLine {
                item_id: item.id,
                name: item.name.clone(),
                unit_price_cents: item.price_cents,
                quantity,
                line_total_cents: item.price_cents.saturating_mul(i64::from(quantity)),
            }
        })
        .collect()
}

/// Status history consistent with the pipeline, capped at `now_ms`.
fn history_for(status: OrderStatus, created_at_ms: i64, now_ms: i64) -> Vec<StatusChange> {
    let at = |offset: i64| (created_at_ms + offset).min(now_ms);
    let mut history = vec![StatusChange { status: OrderStatus::Pending, at_ms: created_at_ms }];
    if status == OrderStatus::Cancelled {
        history.push(StatusChange { status, at_ms: at(CANCELLED_AFTER_MS) });
        return history;
    }
    let steps = [
        (OrderStatus::Preparing, PREPARING_AFTER_MS),
        (OrderStatus::Ready, READY_AFTER_MS),
        (OrderStatus::Completed, COMPLETED_AFTER_MS),
    ];
    let mut current = OrderStatus::Pending;
    for (next, offset) in steps {
        if current == status {
            break;
        }
        history.push(StatusChange { status: next, at_ms: at(offset) });
        current = next;
    }
    history
}

// =============================================================================
// SIMULATOR
// =============================================================================

/// Advance every loaded demo stall by one step. Returns the number of
/// orders touched.
pub async fn simulate_tick<R: Rng + Send>(state: &AppState, rng: &mut R, now_ms: i64) -> usize {
    let mut stalls = state.stalls.write().await;
    let mut touched = 0;

    for (stall_id, stall_state) in stalls.iter_mut() {
        if !stall_state.stall.is_demo {
            continue;
        }

        let oldest_active = stall_state
            .orders
            .values()
            .filter(|o| !o.status.is_terminal())
            .min_by_key(|o| (o.created_at_ms, o.number))
            .map(|o| (o.id, o.status));
        if let Some((order_id, status)) = oldest_active {
            if let Some(next) = status.next() {
                if order::apply_transition(stall_state, order_id, next, None, now_ms).is_ok() {
                    touched += 1;
                }
            }
        }

        if stall_state.stall.is_open && rng.random_bool(NEW_ORDER_PROBABILITY) {
            let mut available: Vec<&MenuItem> = stall_state
                .menu
                .values()
                .filter(|item| item.available)
                .collect();
            available.sort_by(|a, b| a.name.cmp(&b.name));
            if available.is_empty() {
                continue;
            }
            let lines: Vec<CartLine> = random_lines(rng, &available)
                .into_iter()
                .map(|line| CartLine { item_id: line.item_id, quantity: line.quantity })
                .collect();
            let name_idx = rng.random_range(0..CUSTOMER_NAMES.len());
            let request = NewOrder {
                customer_name: Some(CUSTOMER_NAMES[name_idx].to_owned()),
                table_label: Some(format!("T{}", rng.random_range(1..=24))),
                notes: None,
                lines,
            };
            if let Ok(priced) = cart::price_cart(&stall_state.menu, &request.lines) {
                order::insert_order(stall_state, priced, &request, now_ms);
                touched += 1;
            }
        }
        debug!(%stall_id, touched, "demo simulator tick");
    }

    touched
}

/// Spawn the simulator loop. Returns `None` when disabled by config.
#[must_use]
pub fn spawn_demo_simulator(state: AppState) -> Option<JoinHandle<()>> {
    let interval_secs = state.config.demo_sim_interval_secs;
    if interval_secs == 0 {
        info!("demo simulator disabled");
        return None;
    }
    info!(interval_secs, "demo simulator configured");

    Some(tokio::spawn(async move {
        let mut rng = StdRng::from_os_rng();
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            simulate_tick(&state, &mut rng, now_ms()).await;
        }
    }))
}

#[cfg(test)]
#[path = "demo_test.rs"]
mod tests;
