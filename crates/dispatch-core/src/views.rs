//! Read-side projections for dashboards and operator tools.
//!
//! A [`Snapshot`] is a consistent copy of every table, the configuration
//! and the virtual time, taken by the coordinator under its lock. All
//! views are computed from a snapshot and returned as owned values, so
//! callers never hold the lock while rendering.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryOutcome, DispatchConfig, Order, OrderId, OrderStatus,
    ScheduleStatus,
};

use crate::status;
use crate::workflow;

/// Everything the views read, captured at one instant.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// All orders.
    pub orders: Vec<Order>,
    /// All deliveries.
    pub deliveries: Vec<Delivery>,
    /// All couriers.
    pub couriers: Vec<Courier>,
    /// Business configuration.
    pub config: DispatchConfig,
    /// Virtual time of the snapshot.
    pub now: DateTime<Utc>,
}

/// An order with its derived state.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// The order.
    pub order: Order,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Schedule status.
    pub schedule: ScheduleStatus,
    /// Time until the deadline; negative when overdue.
    pub time_left: TimeDelta,
    /// Number of delivery attempts.
    pub attempts: usize,
    /// Courier of the open delivery, if any.
    pub current_courier: Option<CourierId>,
    /// Outcome of the most recent closed attempt.
    pub last_outcome: Option<DeliveryOutcome>,
}

/// A courier with delivery statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CourierSummary {
    /// The courier.
    pub courier: Courier,
    /// Deliveries completed by the deadline.
    pub on_time: usize,
    /// Deliveries completed after the deadline.
    pub late: usize,
    /// The courier's open delivery, if any.
    pub open_delivery: Option<Delivery>,
    /// Last activity used by the inactivity sweep.
    pub last_activity: DateTime<Utc>,
}

/// Order count per status and schedule status.
pub type OrderCounts = BTreeMap<OrderStatus, BTreeMap<ScheduleStatus, usize>>;

impl Snapshot {
    fn summarize(&self, order: &Order) -> OrderSummary {
        let own: Vec<&Delivery> = self
            .deliveries
            .iter()
            .filter(|d| d.order_id == order.id)
            .collect();
        let last_outcome = own
            .iter()
            .filter(|d| !d.is_open())
            .max_by_key(|d| d.start_time)
            .and_then(|d| d.outcome);
        OrderSummary {
            order: order.clone(),
            status: status::derive_order_status(order, &self.deliveries),
            schedule: status::derive_schedule_status(order, &self.deliveries, &self.config, self.now),
            time_left: status::time_left(order, &self.config, self.now),
            attempts: own.len(),
            current_courier: own.iter().find(|d| d.is_open()).map(|d| d.courier_id),
            last_outcome,
        }
    }

    /// Summary of one order.
    pub fn order_summary(&self, id: OrderId) -> Option<OrderSummary> {
        self.orders
            .iter()
            .find(|o| o.id == id)
            .map(|o| self.summarize(o))
    }

    /// Summaries of every order, oldest first.
    pub fn order_summaries(&self) -> Vec<OrderSummary> {
        let mut out: Vec<OrderSummary> = self.orders.iter().map(|o| self.summarize(o)).collect();
        out.sort_by_key(|s| (s.order.created_at, s.order.id));
        out
    }

    /// Status by schedule matrix. Every cell is present, zero or not.
    pub fn order_counts(&self) -> OrderCounts {
        let mut counts: OrderCounts = OrderStatus::ALL
            .iter()
            .map(|s| (*s, ScheduleStatus::ALL.iter().map(|c| (*c, 0)).collect()))
            .collect();
        for order in &self.orders {
            let status = status::derive_order_status(order, &self.deliveries);
            let schedule =
                status::derive_schedule_status(order, &self.deliveries, &self.config, self.now);
            if let Some(cell) = counts.get_mut(&status).and_then(|row| row.get_mut(&schedule)) {
                *cell = cell.saturating_add(1);
            }
        }
        counts
    }

    /// Every courier with on-time and late delivery counts.
    pub fn courier_summaries(&self) -> Vec<CourierSummary> {
        self.couriers
            .iter()
            .map(|courier| {
                let mut on_time = 0_usize;
                let mut late = 0_usize;
                for delivery in self.deliveries.iter().filter(|d| {
                    d.courier_id == courier.id && d.outcome == Some(DeliveryOutcome::Delivered)
                }) {
                    let deadline = self
                        .orders
                        .iter()
                        .find(|o| o.id == delivery.order_id)
                        .map(|o| status::deadline(o, &self.config));
                    match (deadline, delivery.end_time) {
                        (Some(deadline), Some(end)) if end > deadline => {
                            late = late.saturating_add(1);
                        }
                        _ => on_time = on_time.saturating_add(1),
                    }
                }
                CourierSummary {
                    courier: courier.clone(),
                    on_time,
                    late,
                    open_delivery: self
                        .deliveries
                        .iter()
                        .find(|d| d.courier_id == courier.id && d.is_open())
                        .cloned(),
                    last_activity: status::last_activity(courier, &self.deliveries),
                }
            })
            .collect()
    }

    /// Closed deliveries of a courier, newest first.
    pub fn courier_history(&self, id: CourierId) -> Vec<Delivery> {
        let mut history: Vec<Delivery> = self
            .deliveries
            .iter()
            .filter(|d| d.courier_id == id && !d.is_open())
            .cloned()
            .collect();
        history.sort_by(|a, b| b.end_time.cmp(&a.end_time));
        history
    }

    /// Orders a courier could take now, nearest first.
    ///
    /// Only scheduled orders within the courier's distance limit are
    /// listed; orders with an unknown distance are listed last.
    pub fn open_orders_for_courier(&self, id: CourierId) -> Vec<OrderSummary> {
        let Some(courier) = self.couriers.iter().find(|c| c.id == id) else {
            return Vec::new();
        };
        let limit = workflow::distance_limit(courier, &self.config);

        let mut candidates: Vec<OrderSummary> = self
            .orders
            .iter()
            .filter(|o| status::derive_order_status(o, &self.deliveries) == OrderStatus::Scheduled)
            .filter(|o| match (limit, o.air_distance_km) {
                (Some(limit), Some(km)) => km <= limit,
                _ => true,
            })
            .map(|o| self.summarize(o))
            .collect();
        candidates.sort_by(|a, b| {
            let a = a.order.air_distance_km.unwrap_or(f64::INFINITY);
            let b = b.order.air_distance_km.unwrap_or(f64::INFINITY);
            a.total_cmp(&b)
        });
        candidates
    }
}
