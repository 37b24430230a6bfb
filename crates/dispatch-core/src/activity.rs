//! Courier activity sweep.
//!
//! [`sweep`] runs once per clock advance while the coordinator holds its
//! global lock, so it always sees exactly the time that advance set. Each
//! active courier is processed on its own: a failure on one courier is
//! logged, counted in the [`SweepReport`], and the sweep moves on. Clock
//! progress never depends on the sweep succeeding.

use chrono::{DateTime, Utc};
use dispatch_db::{Store, StoreError};
use dispatch_types::{CourierId, CourierUpdate, Delivery, DeliveryOutcome, DispatchConfig};
use tracing::{info, warn};

use crate::error::DispatchError;
use crate::status;

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Couriers deactivated for inactivity.
    pub deactivated: Vec<CourierId>,
    /// Deliveries the sweep closed with [`DeliveryOutcome::Failed`].
    pub closed: Vec<Delivery>,
    /// Couriers that could not be processed.
    pub failures: usize,
}

impl SweepReport {
    /// Whether the sweep changed any record.
    pub fn changed_anything(&self) -> bool {
        !self.deactivated.is_empty() || !self.closed.is_empty()
    }
}

/// Deactivate every active courier idle for longer than the inactivity
/// range at `now`, failing its open deliveries first.
///
/// The delivery table is read once and grouped by courier. A record that
/// fails to decode only fails the courier it belongs to.
pub fn sweep(store: &dyn Store, config: &DispatchConfig, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    let listing = store
        .active_courier_ids()
        .and_then(|ids| store.deliveries_by_courier().map(|histories| (ids, histories)));
    let (ids, mut histories) = match listing {
        Ok(listing) => listing,
        Err(err) => {
            warn!(error = %err, "Activity sweep could not list couriers");
            report.failures = report.failures.saturating_add(1);
            return report;
        }
    };

    for courier_id in ids {
        let history = histories.remove(&courier_id).unwrap_or_else(|| Ok(Vec::new()));
        match sweep_courier(store, courier_id, history, config, now, &mut report.closed) {
            Ok(true) => {
                info!(
                    courier_id = %courier_id,
                    now = %now,
                    "Courier deactivated for inactivity"
                );
                report.deactivated.push(courier_id);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(courier_id = %courier_id, error = %err, "Activity sweep skipped courier");
                report.failures = report.failures.saturating_add(1);
            }
        }
    }

    report
}

/// Process one courier. Returns whether it was deactivated.
///
/// Deliveries closed before a later step fails stay in `closed`: they were
/// written and subscribers must hear about them.
fn sweep_courier(
    store: &dyn Store,
    courier_id: CourierId,
    history: Result<Vec<Delivery>, StoreError>,
    config: &DispatchConfig,
    now: DateTime<Utc>,
    closed: &mut Vec<Delivery>,
) -> Result<bool, DispatchError> {
    let courier = store.read_courier(courier_id)?;
    let history = history?;
    if !status::is_inactive(&courier, &history, config, now) {
        return Ok(false);
    }

    for open in history.iter().filter(|d| d.is_open()) {
        let failed = status::close_delivery(open, now, DeliveryOutcome::Failed)?;
        store.update_delivery(&failed)?;
        closed.push(failed);
    }

    store.update_courier(&courier.with_update(&CourierUpdate::active(false)))?;
    Ok(true)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use dispatch_db::{CourierRow, DeliveryRow, MemoryStore};
    use dispatch_types::{Courier, OrderId, VehicleKind};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn courier(joined_at: DateTime<Utc>) -> Courier {
        Courier {
            id: CourierId::new(),
            name: "Tal".to_owned(),
            phone: "050-2222222".to_owned(),
            email: "tal@example.com".to_owned(),
            active: true,
            vehicle: VehicleKind::Bicycle,
            joined_at,
            max_distance_km: None,
        }
    }

    #[test]
    fn idle_courier_is_deactivated_and_open_delivery_failed() {
        let store = MemoryStore::new();
        let c = courier(t0());
        store.create_courier(&c).unwrap();
        let open = Delivery::open(OrderId::new(), c.id, c.vehicle, t0(), None);
        store.create_delivery(&open).unwrap();

        let config = DispatchConfig::default();
        let report = sweep(&store, &config, t0() + TimeDelta::days(3));
        assert!(!report.changed_anything());

        let at = t0() + TimeDelta::days(3) + TimeDelta::minutes(1);
        let report = sweep(&store, &config, at);
        assert_eq!(report.deactivated, vec![c.id]);
        assert_eq!(report.closed.len(), 1);
        assert_eq!(report.failures, 0);

        let stored = store.read_delivery(open.id).unwrap();
        assert_eq!(stored.outcome, Some(DeliveryOutcome::Failed));
        assert_eq!(stored.end_time, Some(at));
        assert!(!store.read_courier(c.id).unwrap().active);
    }

    #[test]
    fn inactive_couriers_are_not_swept_again() {
        let store = MemoryStore::new();
        let mut c = courier(t0());
        c.active = false;
        store.create_courier(&c).unwrap();

        let report = sweep(&store, &DispatchConfig::default(), t0() + TimeDelta::days(30));
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn undecodable_courier_fails_alone() {
        let store = MemoryStore::new();
        let healthy = courier(t0());
        store.create_courier(&healthy).unwrap();
        let mut row = CourierRow::from(&courier(t0()));
        row.vehicle = "jetpack".to_owned();
        store.insert_courier_row(row).unwrap();

        let config = DispatchConfig::default();
        let report = sweep(&store, &config, t0() + TimeDelta::days(4));
        assert_eq!(report.deactivated, vec![healthy.id]);
        assert_eq!(report.failures, 1);
        assert!(!store.read_courier(healthy.id).unwrap().active);

        // Still isolated on later sweeps.
        let report = sweep(&store, &config, t0() + TimeDelta::days(5));
        assert!(report.deactivated.is_empty());
        assert_eq!(report.failures, 1);
    }

    #[test]
    fn undecodable_delivery_fails_only_its_courier() {
        let store = MemoryStore::new();
        let (healthy, broken) = (courier(t0()), courier(t0()));
        store.create_courier(&healthy).unwrap();
        store.create_courier(&broken).unwrap();
        let open = Delivery::open(OrderId::new(), healthy.id, healthy.vehicle, t0(), None);
        store.create_delivery(&open).unwrap();
        let mut row = DeliveryRow::from(&Delivery::open(
            OrderId::new(),
            broken.id,
            broken.vehicle,
            t0(),
            None,
        ));
        row.vehicle = "jetpack".to_owned();
        store.insert_delivery_row(row).unwrap();

        let report = sweep(&store, &DispatchConfig::default(), t0() + TimeDelta::days(4));
        assert_eq!(report.deactivated, vec![healthy.id]);
        assert_eq!(report.closed.len(), 1);
        assert_eq!(report.failures, 1);
        assert!(store.read_courier(broken.id).unwrap().active);
        assert_eq!(
            store.read_delivery(open.id).unwrap().outcome,
            Some(DeliveryOutcome::Failed)
        );
    }
}
