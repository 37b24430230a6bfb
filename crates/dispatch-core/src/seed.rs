//! Deterministic sample data for demos and tests.
//!
//! [`populate`] writes couriers, orders and a plausible delivery history
//! ending at `now`. The same seed always produces the same records (ids
//! aside, which are fresh UUIDs), so demo runs are reproducible.

use chrono::{DateTime, TimeDelta, Utc};
use dispatch_db::Store;
use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryOutcome, DispatchConfig, GeoPoint, Order, OrderId,
    OrderType, VehicleKind,
};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::error::DispatchError;
use crate::geo::{self, SAMPLE_ADDRESSES};

const COURIERS: usize = 8;
const ORDERS: usize = 24;

const FIRST_NAMES: &[&str] = &[
    "Noa", "Yossi", "Tamar", "Eitan", "Maya", "Omer", "Shira", "Avi", "Dana", "Itai",
];
const LAST_NAMES: &[&str] = &[
    "Cohen", "Levi", "Mizrahi", "Peretz", "Biton", "Friedman", "Azulay", "Katz",
];
const ORDER_TYPES: &[OrderType] = &[
    OrderType::Food,
    OrderType::Groceries,
    OrderType::Electronics,
    OrderType::Documents,
    OrderType::Pharmacy,
];
const VEHICLES: &[VehicleKind] = &[
    VehicleKind::Car,
    VehicleKind::Motorcycle,
    VehicleKind::Bicycle,
    VehicleKind::OnFoot,
];
const CLOSING_OUTCOMES: &[DeliveryOutcome] = &[
    DeliveryOutcome::Delivered,
    DeliveryOutcome::Delivered,
    DeliveryOutcome::Delivered,
    DeliveryOutcome::Refused,
    DeliveryOutcome::Canceled,
    DeliveryOutcome::NotThere,
    DeliveryOutcome::Failed,
];

/// How many records [`populate`] wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Couriers written.
    pub couriers: usize,
    /// Orders written.
    pub orders: usize,
    /// Deliveries written.
    pub deliveries: usize,
}

/// `at - minutes`, clamped to the calendar.
fn minutes_before(at: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    at.checked_sub_signed(TimeDelta::minutes(minutes))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `at + minutes`, never later than `limit`.
fn minutes_after(at: DateTime<Utc>, minutes: i64, limit: DateTime<Utc>) -> DateTime<Utc> {
    at.checked_add_signed(TimeDelta::minutes(minutes))
        .map_or(limit, |t| t.min(limit))
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T], fallback: &'a T) -> &'a T {
    items.choose(rng).unwrap_or(fallback)
}

fn sample_courier(rng: &mut StdRng, now: DateTime<Utc>, active: bool) -> Courier {
    let first = pick(rng, FIRST_NAMES, &"Courier");
    let last = pick(rng, LAST_NAMES, &"Sample");
    let vehicle = *pick(rng, VEHICLES, &VehicleKind::Car);
    let max_distance_km = match vehicle {
        VehicleKind::OnFoot => Some(3.0),
        VehicleKind::Bicycle => Some(8.0),
        VehicleKind::Car | VehicleKind::Motorcycle => None,
    };
    Courier {
        id: CourierId::new(),
        name: format!("{first} {last}"),
        phone: format!(
            "05{}-{:07}",
            rng.random_range(0..10_u8),
            rng.random_range(0..10_000_000_u32)
        ),
        email: format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase()),
        active,
        vehicle,
        joined_at: minutes_before(now, rng.random_range(5_i64..400).saturating_mul(24 * 60)),
        max_distance_km,
    }
}

fn sample_order(rng: &mut StdRng, now: DateTime<Utc>, depot: GeoPoint) -> Order {
    // Skip the depot itself.
    let destinations = SAMPLE_ADDRESSES.get(1..).unwrap_or(SAMPLE_ADDRESSES);
    let (address, lat, lon) = *pick(rng, destinations, &("Jaffa Rd 1, Jerusalem", depot.lat, depot.lon));
    let location = GeoPoint::new(lat, lon);
    Order {
        id: OrderId::new(),
        order_type: *pick(rng, ORDER_TYPES, &OrderType::Food),
        customer_name: format!(
            "{} {}",
            pick(rng, FIRST_NAMES, &"Customer"),
            pick(rng, LAST_NAMES, &"Sample")
        ),
        customer_phone: format!("02-{:07}", rng.random_range(0..10_000_000_u32)),
        address: address.to_owned(),
        location: Some(location),
        air_distance_km: Some(geo::haversine_km(depot, location)),
        notes: rng.random_bool(0.25).then(|| "Call on arrival".to_owned()),
        volume_liters: rng.random_bool(0.5).then(|| f64::from(rng.random_range(1_u8..40))),
        is_fragile: rng.random_bool(0.2),
        created_at: minutes_before(now, rng.random_range(20_i64..1_440)),
    }
}

/// Write sample data ending at `now`.
///
/// The store is expected to be empty. Every invariant holds for the
/// written history: at most one open delivery per order and per courier,
/// no open delivery on an inactive courier, and every closed delivery
/// ends no later than `now`.
pub fn populate(
    store: &dyn Store,
    config: &DispatchConfig,
    now: DateTime<Utc>,
    seed: u64,
) -> Result<SeedSummary, DispatchError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut summary = SeedSummary::default();

    // --- Couriers (the last one starts inactive) ---
    let mut couriers = Vec::with_capacity(COURIERS);
    for index in 0..COURIERS {
        let courier = sample_courier(&mut rng, now, index.saturating_add(1) < COURIERS);
        store.create_courier(&courier)?;
        couriers.push(courier);
    }
    summary.couriers = couriers.len();

    let mut busy: Vec<CourierId> = Vec::new();

    // --- Orders and their history ---
    for _ in 0..ORDERS {
        let order = sample_order(&mut rng, now, config.depot);
        store.create_order(&order)?;
        summary.orders = summary.orders.saturating_add(1);

        let mut cursor = order.created_at;
        let attempts = rng.random_range(0_u8..3);
        for attempt in 0..attempts {
            let Some(courier) = couriers.choose(&mut rng) else {
                break;
            };
            let start = minutes_after(cursor, rng.random_range(5..40), now);
            let last_attempt = attempt.saturating_add(1) == attempts;

            // The final attempt of some orders is still on the road.
            let leave_open = last_attempt
                && courier.active
                && !busy.contains(&courier.id)
                && rng.random_bool(0.4);

            let delivery = Delivery::open(
                order.id,
                courier.id,
                courier.vehicle,
                start,
                order.air_distance_km,
            );
            let delivery = if leave_open {
                busy.push(courier.id);
                delivery
            } else {
                let end = minutes_after(start, rng.random_range(10..90), now);
                let outcome = if last_attempt {
                    *pick(&mut rng, CLOSING_OUTCOMES, &DeliveryOutcome::Delivered)
                } else {
                    DeliveryOutcome::NotThere
                };
                cursor = end;
                delivery.closed(end, outcome)
            };
            store.create_delivery(&delivery)?;
            summary.deliveries = summary.deliveries.saturating_add(1);
        }
    }

    info!(
        seed,
        couriers = summary.couriers,
        orders = summary.orders,
        deliveries = summary.deliveries,
        "Sample data written"
    );
    Ok(summary)
}
