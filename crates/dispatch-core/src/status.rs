//! Status derivation engine.
//!
//! Order status and schedule status are never stored. They are pure
//! functions of an order, its delivery history, the business
//! configuration and the virtual time, recomputed on every read. Nothing
//! here locks: callers pass in a snapshot they read consistently.
//!
//! # Rules
//!
//! - The *latest* delivery (greatest start time, open delivery wins a tie)
//!   decides the order status. `Failed` and `NotThere` requeue the order.
//! - `deadline = created_at + max_delivery_time`, and the risk window is
//!   the `risk_range` ending at the deadline. Arriving exactly at the
//!   deadline is not late; entering exactly at the risk start is risk.
//! - A closed order is judged by its closing time, an open one by `now`.

use chrono::{DateTime, TimeDelta, Utc};
use dispatch_types::{
    Courier, Delivery, DeliveryId, DeliveryOutcome, DispatchConfig, Order, OrderStatus,
    ScheduleStatus,
};

/// Errors from the delivery-closing rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// The delivery already has an end time.
    #[error("delivery {delivery_id} is already closed")]
    AlreadyClosed {
        /// The closed delivery.
        delivery_id: DeliveryId,
    },

    /// The requested end time precedes the start time.
    #[error("delivery {delivery_id} cannot end at {end} before its start {start}")]
    EndBeforeStart {
        /// The delivery being closed.
        delivery_id: DeliveryId,
        /// Its start time.
        start: DateTime<Utc>,
        /// The rejected end time.
        end: DateTime<Utc>,
    },
}

/// The delivery that decides an order's status.
///
/// Only deliveries of `order` are considered, so callers may pass any
/// slice of history.
pub fn latest_delivery<'a>(order: &Order, deliveries: &'a [Delivery]) -> Option<&'a Delivery> {
    deliveries
        .iter()
        .filter(|d| d.order_id == order.id)
        .max_by_key(|d| (d.start_time, d.is_open()))
}

/// Number of delivery attempts recorded for `order`.
pub fn attempts(order: &Order, deliveries: &[Delivery]) -> usize {
    deliveries.iter().filter(|d| d.order_id == order.id).count()
}

/// Derive the lifecycle status of an order from its history.
pub fn derive_order_status(order: &Order, deliveries: &[Delivery]) -> OrderStatus {
    let Some(latest) = latest_delivery(order, deliveries) else {
        return OrderStatus::Scheduled;
    };
    match latest.outcome {
        None => OrderStatus::InTreatment,
        Some(DeliveryOutcome::Delivered) => OrderStatus::Delivered,
        Some(DeliveryOutcome::Refused) => OrderStatus::CustomerRefused,
        Some(DeliveryOutcome::Canceled) => OrderStatus::Canceled,
        Some(DeliveryOutcome::Failed | DeliveryOutcome::NotThere) => OrderStatus::Scheduled,
    }
}

/// The time by which the order must be delivered.
pub fn deadline(order: &Order, config: &DispatchConfig) -> DateTime<Utc> {
    order
        .created_at
        .checked_add_signed(config.max_delivery_time())
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// The time the order enters the risk window.
pub fn risk_start(order: &Order, config: &DispatchConfig) -> DateTime<Utc> {
    deadline(order, config)
        .checked_sub_signed(config.risk_range())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Time remaining until the deadline; negative once overdue.
pub fn time_left(order: &Order, config: &DispatchConfig, now: DateTime<Utc>) -> TimeDelta {
    deadline(order, config).signed_duration_since(now)
}

/// Derive whether the order is (or was) delivered in time.
pub fn derive_schedule_status(
    order: &Order,
    deliveries: &[Delivery],
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> ScheduleStatus {
    let deadline = deadline(order, config);

    if derive_order_status(order, deliveries).is_terminal() {
        let closed_at = latest_delivery(order, deliveries)
            .and_then(|d| d.end_time)
            .unwrap_or(now);
        return if closed_at > deadline {
            ScheduleStatus::Late
        } else {
            ScheduleStatus::OnTime
        };
    }

    if now > deadline {
        ScheduleStatus::Late
    } else if now >= risk_start(order, config) {
        ScheduleStatus::Risk
    } else {
        ScheduleStatus::OnTime
    }
}

/// Close an open delivery at `at` with `outcome`.
///
/// This is the single closing rule shared by completion, the deactivation
/// cascade and the activity sweep.
pub fn close_delivery(
    delivery: &Delivery,
    at: DateTime<Utc>,
    outcome: DeliveryOutcome,
) -> Result<Delivery, StatusError> {
    if !delivery.is_open() {
        return Err(StatusError::AlreadyClosed {
            delivery_id: delivery.id,
        });
    }
    if at < delivery.start_time {
        return Err(StatusError::EndBeforeStart {
            delivery_id: delivery.id,
            start: delivery.start_time,
            end: at,
        });
    }
    Ok(delivery.closed(at, outcome))
}

/// The courier's most recent closed delivery end, or the join date.
pub fn last_activity(courier: &Courier, deliveries: &[Delivery]) -> DateTime<Utc> {
    deliveries
        .iter()
        .filter(|d| d.courier_id == courier.id)
        .filter_map(|d| d.end_time)
        .max()
        .unwrap_or(courier.joined_at)
}

/// Whether the courier has been idle for longer than the inactivity range.
pub fn is_inactive(
    courier: &Courier,
    deliveries: &[Delivery],
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> bool {
    now.signed_duration_since(last_activity(courier, deliveries)) > config.inactivity_range()
}

/// Expected arrival at the customer, when the route distance is known.
pub fn estimated_arrival(delivery: &Delivery, config: &DispatchConfig) -> Option<DateTime<Utc>> {
    let distance = delivery.distance_km?;
    let speed = config.speed_kmh(delivery.vehicle);
    if speed <= 0.0 {
        return None;
    }
    let seconds = (distance / speed * 3_600.0).round();
    if !seconds.is_finite() || seconds < 0.0 || seconds > 1e12 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let seconds = seconds as i64;
    delivery
        .start_time
        .checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::TimeZone;
    use dispatch_types::{CourierId, OrderId, OrderType, VehicleKind};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn order() -> Order {
        Order {
            id: OrderId::new(),
            order_type: OrderType::Groceries,
            customer_name: "Rina".to_owned(),
            customer_phone: "054-0000000".to_owned(),
            address: "Bezalel St 8, Jerusalem".to_owned(),
            location: None,
            air_distance_km: None,
            notes: None,
            volume_liters: None,
            is_fragile: false,
            created_at: t0(),
        }
    }

    fn courier() -> Courier {
        Courier {
            id: CourierId::new(),
            name: "Eli".to_owned(),
            phone: "050-1111111".to_owned(),
            email: "eli@example.com".to_owned(),
            active: true,
            vehicle: VehicleKind::Car,
            joined_at: t0() - TimeDelta::days(30),
            max_distance_km: None,
        }
    }

    fn attempt(order: &Order, courier: &Courier, start: DateTime<Utc>) -> Delivery {
        Delivery::open(order.id, courier.id, courier.vehicle, start, None)
    }

    #[test]
    fn empty_history_is_scheduled() {
        assert_eq!(derive_order_status(&order(), &[]), OrderStatus::Scheduled);
    }

    #[test]
    fn latest_delivery_decides_status() {
        let o = order();
        let c = courier();
        let first = attempt(&o, &c, t0()).closed(t0() + TimeDelta::minutes(20), DeliveryOutcome::NotThere);
        let second = attempt(&o, &c, t0() + TimeDelta::minutes(30));
        let history = vec![first.clone(), second.clone()];
        assert_eq!(derive_order_status(&o, &history), OrderStatus::InTreatment);

        let done = second.closed(t0() + TimeDelta::minutes(50), DeliveryOutcome::Refused);
        assert_eq!(derive_order_status(&o, &[first, done]), OrderStatus::CustomerRefused);
    }

    #[test]
    fn failed_and_not_there_requeue() {
        let o = order();
        let c = courier();
        for outcome in [DeliveryOutcome::Failed, DeliveryOutcome::NotThere] {
            let d = attempt(&o, &c, t0()).closed(t0(), outcome);
            assert_eq!(derive_order_status(&o, &[d]), OrderStatus::Scheduled);
        }
        let canceled = attempt(&o, &c, t0()).closed(t0(), DeliveryOutcome::Canceled);
        assert_eq!(derive_order_status(&o, &[canceled]), OrderStatus::Canceled);
    }

    #[test]
    fn other_orders_are_ignored() {
        let o = order();
        let other = order();
        let c = courier();
        let d = attempt(&other, &c, t0());
        assert_eq!(derive_order_status(&o, &[d]), OrderStatus::Scheduled);
        assert_eq!(attempts(&o, &[]), 0);
    }

    #[test]
    fn tie_on_start_time_favours_open_delivery() {
        let o = order();
        let c = courier();
        let open = attempt(&o, &c, t0());
        let closed = attempt(&o, &c, t0()).closed(t0(), DeliveryOutcome::Failed);
        assert_eq!(derive_order_status(&o, &[open.clone(), closed.clone()]), OrderStatus::InTreatment);
        assert_eq!(derive_order_status(&o, &[closed, open]), OrderStatus::InTreatment);
    }

    #[test]
    fn schedule_boundaries_for_open_order() {
        let o = order();
        let config = DispatchConfig::default();
        let at = |delta: TimeDelta| derive_schedule_status(&o, &[], &config, t0() + delta);

        assert_eq!(at(TimeDelta::minutes(104)), ScheduleStatus::OnTime);
        assert_eq!(at(TimeDelta::minutes(105)), ScheduleStatus::Risk);
        assert_eq!(at(TimeDelta::minutes(106)), ScheduleStatus::Risk);
        assert_eq!(at(TimeDelta::hours(2)), ScheduleStatus::Risk);
        assert_eq!(at(TimeDelta::hours(2) + TimeDelta::seconds(1)), ScheduleStatus::Late);
    }

    #[test]
    fn closed_order_is_judged_by_closing_time() {
        let o = order();
        let c = courier();
        let config = DispatchConfig::default();
        let much_later = t0() + TimeDelta::days(5);

        let on_time = attempt(&o, &c, t0()).closed(t0() + TimeDelta::hours(2), DeliveryOutcome::Delivered);
        assert_eq!(
            derive_schedule_status(&o, &[on_time], &config, much_later),
            ScheduleStatus::OnTime
        );

        let late = attempt(&o, &c, t0()).closed(
            t0() + TimeDelta::hours(2) + TimeDelta::seconds(1),
            DeliveryOutcome::Delivered,
        );
        assert_eq!(
            derive_schedule_status(&o, &[late], &config, much_later),
            ScheduleStatus::Late
        );
    }

    #[test]
    fn requeued_order_is_judged_by_now() {
        let o = order();
        let c = courier();
        let config = DispatchConfig::default();
        let failed = attempt(&o, &c, t0()).closed(t0() + TimeDelta::minutes(10), DeliveryOutcome::Failed);
        assert_eq!(
            derive_schedule_status(&o, &[failed], &config, t0() + TimeDelta::hours(3)),
            ScheduleStatus::Late
        );
    }

    #[test]
    fn time_left_goes_negative() {
        let o = order();
        let config = DispatchConfig::default();
        assert_eq!(time_left(&o, &config, t0()), TimeDelta::hours(2));
        assert_eq!(
            time_left(&o, &config, t0() + TimeDelta::hours(3)),
            TimeDelta::hours(-1)
        );
    }

    #[test]
    fn closing_rule_rejects_closed_and_early_end() {
        let o = order();
        let c = courier();
        let open = attempt(&o, &c, t0());

        assert!(matches!(
            close_delivery(&open, t0() - TimeDelta::minutes(1), DeliveryOutcome::Delivered),
            Err(StatusError::EndBeforeStart { .. })
        ));

        let closed = close_delivery(&open, t0(), DeliveryOutcome::Delivered).unwrap();
        assert_eq!(closed.end_time, Some(t0()));
        assert!(matches!(
            close_delivery(&closed, t0(), DeliveryOutcome::Failed),
            Err(StatusError::AlreadyClosed { .. })
        ));
    }

    #[test]
    fn last_activity_defaults_to_join_date() {
        let c = courier();
        assert_eq!(last_activity(&c, &[]), c.joined_at);

        let o = order();
        let end = t0() + TimeDelta::minutes(40);
        let history = vec![
            attempt(&o, &c, t0()).closed(end, DeliveryOutcome::Delivered),
            attempt(&o, &c, t0() + TimeDelta::hours(1)),
        ];
        assert_eq!(last_activity(&c, &history), end);
    }

    #[test]
    fn inactivity_is_strictly_greater_than_range() {
        let c = courier();
        let o = order();
        let config = DispatchConfig::default();
        let end = t0();
        let history = vec![attempt(&o, &c, t0()).closed(end, DeliveryOutcome::Delivered)];

        assert!(!is_inactive(&c, &history, &config, end + TimeDelta::days(3)));
        assert!(is_inactive(
            &c,
            &history,
            &config,
            end + TimeDelta::days(3) + TimeDelta::minutes(1)
        ));
    }

    #[test]
    fn estimated_arrival_uses_vehicle_speed() {
        let o = order();
        let c = courier();
        let config = DispatchConfig::default();
        let mut d = attempt(&o, &c, t0());
        assert_eq!(estimated_arrival(&d, &config), None);

        // 15 km by car at 30 km/h.
        d.distance_km = Some(15.0);
        assert_eq!(
            estimated_arrival(&d, &config),
            Some(t0() + TimeDelta::minutes(30))
        );
    }
}
