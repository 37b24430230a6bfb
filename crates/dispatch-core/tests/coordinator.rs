//! Integration tests for the dispatch coordinator.
//!
//! These drive the public `Coordinator` API end to end over a memory
//! store: clock advances with the inactivity sweep, the assignment
//! workflow, the deactivation cascade and observer publication.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc,
    clippy::too_many_lines
)]

mod common;

use std::sync::Arc;

use chrono::TimeDelta;
use dispatch_core::{ClockUnit, DispatchError, observer};
use dispatch_db::{CourierRow, DeliveryRow, MemoryStore, Store};
use dispatch_types::{
    CourierId, CourierUpdate, Delivery, DeliveryId, DeliveryOutcome, DispatchConfig, OrderId,
    OrderStatus, OrderUpdate, ScheduleStatus,
};

use common::{
    FlakyStore, coordinator, coordinator_with, count, counter, courier_draft, order_draft, start,
};

#[test]
fn new_order_is_scheduled_and_on_time() {
    let c = coordinator();
    let order = c.create_order(order_draft("Ayelet")).unwrap();
    let summary = c.order_summary(order.id).unwrap();
    assert_eq!(summary.status, OrderStatus::Scheduled);
    assert_eq!(summary.schedule, ScheduleStatus::OnTime);
    assert_eq!(summary.attempts, 0);
}

#[test]
fn assign_then_deliver_before_deadline() {
    let c = coordinator();
    let order = c.create_order(order_draft("Boaz")).unwrap();
    let courier = c.create_courier(courier_draft("Carmel")).unwrap();

    let delivery = c.assign(order.id, courier.id).unwrap();
    assert_eq!(delivery.start_time, start());
    // The order has coordinates, so the route distance is known.
    assert!(delivery.distance_km.is_some());
    assert_eq!(
        c.order_summary(order.id).unwrap().status,
        OrderStatus::InTreatment
    );

    c.advance_by(TimeDelta::minutes(40)).unwrap();
    let closed = c
        .complete_delivery(delivery.id, DeliveryOutcome::Delivered)
        .unwrap();
    assert_eq!(closed.end_time, Some(start() + TimeDelta::minutes(40)));

    // Long after the deadline, a delivered order stays on time.
    c.advance_unit(ClockUnit::Day).unwrap();
    let summary = c.order_summary(order.id).unwrap();
    assert_eq!(summary.status, OrderStatus::Delivered);
    assert_eq!(summary.schedule, ScheduleStatus::OnTime);
}

#[test]
fn one_open_delivery_per_order_and_per_courier() {
    let c = coordinator();
    let first = c.create_order(order_draft("Dalia")).unwrap();
    let second = c.create_order(order_draft("Ehud")).unwrap();
    let busy = c.create_courier(courier_draft("Fanny")).unwrap();
    let idle = c.create_courier(courier_draft("Gideon")).unwrap();

    c.assign(first.id, busy.id).unwrap();
    assert!(matches!(
        c.assign(first.id, idle.id),
        Err(DispatchError::InvalidValue { .. })
    ));
    assert!(matches!(
        c.assign(second.id, busy.id),
        Err(DispatchError::InvalidValue { .. })
    ));
    assert!(c.assign(second.id, idle.id).is_ok());
}

#[test]
fn schedule_status_follows_the_clock() {
    let c = coordinator();
    let order = c.create_order(order_draft("Hila")).unwrap();
    let schedule = || c.order_summary(order.id).unwrap().schedule;

    c.advance(start() + TimeDelta::minutes(106)).unwrap();
    assert_eq!(schedule(), ScheduleStatus::Risk);

    c.advance(start() + TimeDelta::hours(2)).unwrap();
    assert_eq!(schedule(), ScheduleStatus::Risk);

    c.advance(start() + TimeDelta::hours(2) + TimeDelta::seconds(1))
        .unwrap();
    assert_eq!(schedule(), ScheduleStatus::Late);
}

#[test]
fn sweep_deactivates_after_inactivity_and_fails_open_delivery() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Ido")).unwrap();
    let first = c.create_order(order_draft("Joseph")).unwrap();
    let second = c.create_order(order_draft("Keren")).unwrap();

    let d = c.assign(first.id, courier.id).unwrap();
    c.advance_by(TimeDelta::minutes(20)).unwrap();
    c.complete_delivery(d.id, DeliveryOutcome::Delivered).unwrap();
    let last_end = c.now();
    let open = c.assign(second.id, courier.id).unwrap();

    let report = c.advance(last_end + TimeDelta::days(3)).unwrap();
    assert!(report.deactivated.is_empty());
    assert!(c.store().read_courier(courier.id).unwrap().active);

    let deadline_passed = last_end + TimeDelta::days(3) + TimeDelta::minutes(1);
    let report = c.advance(deadline_passed).unwrap();
    assert_eq!(report.deactivated, vec![courier.id]);
    assert!(!c.store().read_courier(courier.id).unwrap().active);

    let failed = c.store().read_delivery(open.id).unwrap();
    assert_eq!(failed.outcome, Some(DeliveryOutcome::Failed));
    assert_eq!(failed.end_time, Some(deadline_passed));
    // Failed requeues the order.
    assert_eq!(
        c.order_summary(second.id).unwrap().status,
        OrderStatus::Scheduled
    );
}

#[test]
fn sweep_publishes_courier_and_order_changes() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Lea")).unwrap();
    let order = c.create_order(order_draft("Meir")).unwrap();
    c.assign(order.id, courier.id).unwrap();

    let (clock_ticks, on_clock) = counter();
    let (courier_list, on_couriers) = counter();
    let (courier_entity, on_courier) = counter();
    let (order_entity, on_order) = counter();
    c.observers().clock.subscribe_list(on_clock);
    c.observers().couriers.subscribe_list(on_couriers);
    c.observers().couriers.subscribe_entity(courier.id, on_courier);
    c.observers().orders.subscribe_entity(order.id, on_order);

    c.advance_unit(ClockUnit::Hour).unwrap();
    assert_eq!(count(&clock_ticks), 1);
    assert_eq!(count(&courier_list), 0);

    c.advance_unit(ClockUnit::Month).unwrap();
    assert_eq!(count(&clock_ticks), 2);
    assert_eq!(count(&courier_list), 1);
    assert_eq!(count(&courier_entity), 1);
    assert_eq!(count(&order_entity), 1);
}

#[test]
fn explicit_deactivation_cancels_and_publishes_once() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Nir")).unwrap();
    let order = c.create_order(order_draft("Orly")).unwrap();
    let delivery = c.assign(order.id, courier.id).unwrap();
    c.advance_by(TimeDelta::minutes(5)).unwrap();

    let (order_changes, on_order) = counter();
    let (courier_lists, on_couriers) = counter();
    c.observers().orders.subscribe_entity(order.id, on_order);
    c.observers().couriers.subscribe_list(on_couriers);

    let change = c
        .update_courier(courier.id, &CourierUpdate::active(false))
        .unwrap();
    assert!(!change.courier.active);
    assert_eq!(count(&order_changes), 1);
    assert_eq!(count(&courier_lists), 1);

    let canceled = c.store().read_delivery(delivery.id).unwrap();
    assert_eq!(canceled.outcome, Some(DeliveryOutcome::Canceled));
    assert_eq!(canceled.end_time, Some(start() + TimeDelta::minutes(5)));
    assert_eq!(
        c.order_summary(order.id).unwrap().status,
        OrderStatus::Canceled
    );
}

#[test]
fn failed_cascade_leaves_no_mutation() {
    let store = Arc::new(FlakyStore::default());
    let c = coordinator_with(Arc::clone(&store) as Arc<dyn Store>);
    let courier = c.create_courier(courier_draft("Pnina")).unwrap();
    let order = c.create_order(order_draft("Rafi")).unwrap();
    let delivery = c.assign(order.id, courier.id).unwrap();
    store.fail_updates_for(courier.id);

    let (order_changes, on_order) = counter();
    c.observers().orders.subscribe_entity(order.id, on_order);

    let result = c.update_courier(courier.id, &CourierUpdate::active(false));
    assert!(matches!(
        result,
        Err(DispatchError::TemporarilyUnavailable { .. })
    ));
    assert!(store.read_delivery(delivery.id).unwrap().is_open());
    assert!(store.read_courier(courier.id).unwrap().active);
    assert_eq!(count(&order_changes), 0);
}

#[test]
fn one_bad_courier_does_not_stop_the_sweep() {
    let store = Arc::new(FlakyStore::default());
    let c = coordinator_with(Arc::clone(&store) as Arc<dyn Store>);
    let stuck = c.create_courier(courier_draft("Sagi")).unwrap();
    let fine = c.create_courier(courier_draft("Tova")).unwrap();
    store.fail_updates_for(stuck.id);

    let target = start() + TimeDelta::days(4);
    let report = c.advance(target).unwrap();
    assert_eq!(c.now(), target);
    assert_eq!(report.failures, 1);
    assert_eq!(report.deactivated, vec![fine.id]);
    assert!(store.read_courier(stuck.id).unwrap().active);

    // The stuck courier is retried on the next advance.
    let report = c.advance_unit(ClockUnit::Minute).unwrap();
    assert_eq!(report.failures, 1);
}

#[test]
fn corrupt_courier_row_only_fails_that_courier() {
    let store = Arc::new(MemoryStore::new());
    let c = coordinator_with(Arc::clone(&store) as Arc<dyn Store>);
    let healthy = c.create_courier(courier_draft("Uri")).unwrap();
    let mut row = CourierRow::from(&healthy);
    row.id = CourierId::new();
    row.vehicle = "jetpack".to_owned();
    store.insert_courier_row(row).unwrap();

    let report = c.advance(start() + TimeDelta::days(4)).unwrap();
    assert_eq!(report.deactivated, vec![healthy.id]);
    assert_eq!(report.failures, 1);
    assert!(!store.read_courier(healthy.id).unwrap().active);

    let report = c.advance_unit(ClockUnit::Year).unwrap();
    assert_eq!(report.failures, 1);
    assert_eq!(c.now(), start() + TimeDelta::days(369));
}

#[test]
fn corrupt_delivery_row_only_fails_its_courier() {
    let store = Arc::new(MemoryStore::new());
    let c = coordinator_with(Arc::clone(&store) as Arc<dyn Store>);
    let healthy = c.create_courier(courier_draft("Vardit")).unwrap();
    let broken = c.create_courier(courier_draft("Yoav")).unwrap();
    let mut row = DeliveryRow::from(&Delivery::open(
        OrderId::new(),
        broken.id,
        broken.vehicle,
        start(),
        None,
    ));
    row.end_time = Some(start());
    row.outcome = Some("teleported".to_owned());
    store.insert_delivery_row(row).unwrap();

    // Workflow reads for other couriers and orders are unaffected.
    let spare = c.create_courier(courier_draft("Zohar")).unwrap();
    let order = c.create_order(order_draft("Amos")).unwrap();
    c.assign(order.id, spare.id).unwrap();

    let report = c.advance(start() + TimeDelta::days(4)).unwrap();
    assert_eq!(report.failures, 1);
    assert!(report.deactivated.contains(&healthy.id));
    assert!(report.deactivated.contains(&spare.id));
    assert!(!report.deactivated.contains(&broken.id));
    assert!(store.read_courier(broken.id).unwrap().active);
    assert!(store.open_deliveries_of_courier(spare.id).unwrap().is_empty());
}

#[test]
fn backward_clock_is_rejected() {
    let c = coordinator();
    c.advance_unit(ClockUnit::Day).unwrap();
    assert!(matches!(
        c.advance(start()),
        Err(DispatchError::InvalidValue { .. })
    ));
}

#[test]
fn completion_errors() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Vered")).unwrap();
    let order = c.create_order(order_draft("Ziv")).unwrap();
    let d = c.assign(order.id, courier.id).unwrap();
    c.complete_delivery(d.id, DeliveryOutcome::Refused).unwrap();
    assert!(matches!(
        c.complete_delivery(d.id, DeliveryOutcome::Delivered),
        Err(DispatchError::InvalidValue { .. })
    ));
    assert!(matches!(
        c.complete_delivery(DeliveryId::new(), DeliveryOutcome::Delivered),
        Err(DispatchError::NotFound { .. })
    ));
    assert_eq!(
        c.order_summary(order.id).unwrap().status,
        OrderStatus::CustomerRefused
    );
    // A refused order cannot be reassigned.
    assert!(c.assign(order.id, courier.id).is_err());
}

#[test]
fn delete_rules() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Adi")).unwrap();
    let order = c.create_order(order_draft("Bar")).unwrap();
    c.assign(order.id, courier.id).unwrap();

    assert!(matches!(
        c.delete_courier(courier.id),
        Err(DispatchError::DeletionBlocked { .. })
    ));
    assert!(matches!(
        c.delete_order(order.id),
        Err(DispatchError::DeletionBlocked { .. })
    ));

    let spare = c.create_courier(courier_draft("Chen")).unwrap();
    c.delete_courier(spare.id).unwrap();
    assert!(matches!(
        c.delete_courier(spare.id),
        Err(DispatchError::NotFound { .. })
    ));
}

#[test]
fn order_updates_geocode_new_addresses() {
    let c = coordinator();
    let order = c.create_order(order_draft("Dor")).unwrap();
    let moved = c
        .update_order(
            order.id,
            &OrderUpdate {
                address: Some("Mount Scopus Campus, Jerusalem".to_owned()),
                ..OrderUpdate::default()
            },
        )
        .unwrap();
    assert_ne!(moved.location, order.location);
    assert!(moved.air_distance_km.is_some());

    let unknown = c.update_order(
        order.id,
        &OrderUpdate {
            address: Some("Atlantis 1".to_owned()),
            ..OrderUpdate::default()
        },
    );
    assert!(matches!(
        unknown,
        Err(DispatchError::TemporarilyUnavailable { .. })
    ));
}

#[test]
fn create_order_with_unknown_address_creates_nothing() {
    let c = coordinator();
    let mut draft = order_draft("Efrat");
    draft.location = None;
    draft.address = "Nowhere 99".to_owned();
    assert!(matches!(
        c.create_order(draft),
        Err(DispatchError::TemporarilyUnavailable { .. })
    ));
    assert!(c.order_summaries().unwrap().is_empty());
}

#[test]
fn courier_distance_limit_blocks_far_orders() {
    let c = coordinator();
    let mut draft = courier_draft("Gal");
    draft.max_distance_km = Some(0.5);
    let walker = c.create_courier(draft).unwrap();
    let order = c.create_order(order_draft("Hadas")).unwrap();

    assert!(matches!(
        c.assign(order.id, walker.id),
        Err(DispatchError::InvalidValue { .. })
    ));
    assert!(c.open_orders_for_courier(walker.id).unwrap().is_empty());
}

#[test]
fn observers_may_reenter_the_coordinator() {
    let c = coordinator();
    let weak = Arc::downgrade(&c);
    let (seen, on_seen) = counter();
    let reader = observer(move || {
        if let Some(c) = weak.upgrade() {
            // Reading under the global lock from inside a publish must not deadlock.
            let _ = c.now();
            let _ = c.snapshot().unwrap();
            on_seen();
        }
    });
    c.observers().clock.subscribe_list(reader);
    c.advance_unit(ClockUnit::Minute).unwrap();
    assert_eq!(count(&seen), 1);
}

#[test]
fn reset_and_initialize_database() {
    let c = coordinator();
    let summary = c.initialize_database(11).unwrap();
    assert!(summary.orders > 0);
    assert_eq!(c.order_summaries().unwrap().len(), summary.orders);
    assert_eq!(c.courier_summaries().unwrap().len(), summary.couriers);

    let counts = c.order_counts().unwrap();
    let total: usize = counts.values().flat_map(|row| row.values()).sum();
    assert_eq!(total, summary.orders);

    c.advance_unit(ClockUnit::Day).unwrap();
    c.set_config(&DispatchConfig {
        risk_range_minutes: 45,
        ..DispatchConfig::default()
    })
    .unwrap();

    let (config_changes, on_config) = counter();
    c.observers().config.subscribe_list(on_config);
    c.reset_database().unwrap();
    assert_eq!(c.now(), start());
    assert!(c.order_summaries().unwrap().is_empty());
    assert_eq!(c.config().unwrap(), DispatchConfig::default());
    assert_eq!(count(&config_changes), 1);
}

#[test]
fn courier_history_is_newest_first() {
    let c = coordinator();
    let courier = c.create_courier(courier_draft("Inbal")).unwrap();
    for customer in ["Jonathan", "Kobi", "Limor"] {
        let order = c.create_order(order_draft(customer)).unwrap();
        let d = c.assign(order.id, courier.id).unwrap();
        c.advance_by(TimeDelta::minutes(15)).unwrap();
        c.complete_delivery(d.id, DeliveryOutcome::Delivered).unwrap();
    }
    let history = c.courier_history(courier.id).unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history.first().and_then(|d| d.end_time), Some(c.now()));

    let stats = c.courier_summaries().unwrap();
    assert_eq!(stats.first().map(|s| s.on_time), Some(3));
    assert!(matches!(
        c.courier_history(CourierId::new()),
        Err(DispatchError::NotFound { .. })
    ));
}
