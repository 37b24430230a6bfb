//! Observers that turn coordinator notifications into log lines.
//!
//! The engine has no UI; these callbacks stand in for one. Each hub gets
//! a list-level observer that counts its notifications and, for the
//! clock and order hubs, reads back current state through the
//! coordinator the way a window would refresh itself.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dispatch_core::{Coordinator, observer};
use dispatch_types::OrderStatus;
use tracing::{debug, warn};

/// Notification counters per hub.
#[derive(Debug, Default)]
pub struct ChangeLog {
    clock: AtomicU64,
    orders: AtomicU64,
    couriers: AtomicU64,
    config: AtomicU64,
}

/// Totals reported at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeTotals {
    /// Clock notifications.
    pub clock: u64,
    /// Order list notifications.
    pub orders: u64,
    /// Courier list notifications.
    pub couriers: u64,
    /// Configuration notifications.
    pub config: u64,
}

impl ChangeLog {
    /// Subscribe logging observers to every list-level hub of
    /// `coordinator`.
    pub fn attach(coordinator: &Arc<Coordinator>) -> Arc<Self> {
        let log = Arc::new(Self::default());
        let hubs = coordinator.observers();

        let (inner, weak) = (Arc::clone(&log), Arc::downgrade(coordinator));
        hubs.clock.subscribe_list(observer(move || {
            inner.clock.fetch_add(1, Ordering::Relaxed);
            if let Some(c) = weak.upgrade() {
                debug!(now = %c.now(), "Virtual time changed");
            }
        }));

        let (inner, weak) = (Arc::clone(&log), Arc::downgrade(coordinator));
        hubs.orders.subscribe_list(observer(move || {
            inner.orders.fetch_add(1, Ordering::Relaxed);
            log_order_load(&weak);
        }));

        let inner = Arc::clone(&log);
        hubs.couriers.subscribe_list(observer(move || {
            inner.couriers.fetch_add(1, Ordering::Relaxed);
            debug!("Courier list changed");
        }));

        let inner = Arc::clone(&log);
        hubs.config.subscribe_list(observer(move || {
            inner.config.fetch_add(1, Ordering::Relaxed);
            debug!("Configuration changed");
        }));

        log
    }

    /// Current notification totals.
    pub fn totals(&self) -> ChangeTotals {
        ChangeTotals {
            clock: self.clock.load(Ordering::Relaxed),
            orders: self.orders.load(Ordering::Relaxed),
            couriers: self.couriers.load(Ordering::Relaxed),
            config: self.config.load(Ordering::Relaxed),
        }
    }
}

fn log_order_load(coordinator: &Weak<Coordinator>) {
    let Some(c) = coordinator.upgrade() else {
        return;
    };
    match c.order_counts() {
        Ok(counts) => {
            let count = |status: OrderStatus| {
                counts
                    .get(&status)
                    .map_or(0, |row| row.values().sum::<usize>())
            };
            debug!(
                scheduled = count(OrderStatus::Scheduled),
                in_treatment = count(OrderStatus::InTreatment),
                "Order list changed"
            );
        }
        Err(err) => warn!(error = %err, "Order counts unavailable"),
    }
}
