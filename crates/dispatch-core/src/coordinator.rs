//! The dispatch coordinator: one virtual clock, one global lock.
//!
//! [`Coordinator`] owns the virtual clock inside a single
//! [`parking_lot::Mutex`]. That mutex is the global lock: every operation
//! that reads time as a precondition or mutates time-dependent state
//! (clock advances with their activity sweep, configuration changes,
//! database reset and seeding, assignment, completion, the deactivation
//! cascade) runs while holding it, so those operations observe one total
//! order.
//!
//! # Publishing
//!
//! Observers are notified strictly after the lock is released. A callback
//! may call straight back into the coordinator; it sees the state after
//! the mutation that notified it (or later), never a half-applied one.
//!
//! # Collaborators
//!
//! The store is called under the lock; it is local and bounded. The route
//! service may block on the network, so it is only ever called before the
//! lock is taken.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dispatch_db::Store;
use dispatch_types::{
    Courier, CourierId, CourierUpdate, Delivery, DeliveryId, DeliveryOutcome, DispatchConfig, Order,
    OrderId, OrderUpdate,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::activity::{self, SweepReport};
use crate::clock::{ClockError, ClockUnit, VirtualClock};
use crate::config::validate_dispatch;
use crate::error::DispatchError;
use crate::geo::{self, RouteService};
use crate::observer::Observers;
use crate::seed::{self, SeedSummary};
use crate::simulator::{self, SimulatorHandle};
use crate::views::{CourierSummary, OrderCounts, OrderSummary, Snapshot};
use crate::workflow::{self, CourierChange, CourierDraft, OrderDraft};

/// Wall-clock period between simulator ticks unless configured otherwise.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Stateful service owning the virtual clock, the global lock, the
/// observer hubs and the simulator.
pub struct Coordinator {
    /// Storage collaborator.
    store: Arc<dyn Store>,
    /// Geocoding and routing collaborator.
    routes: Arc<dyn RouteService>,
    /// The virtual clock. Its mutex is the global lock.
    clock: Mutex<VirtualClock>,
    /// Change-notification hubs.
    observers: Observers,
    /// The running simulator, if any.
    simulator: Mutex<Option<SimulatorHandle>>,
    /// Wall-clock period between simulator ticks.
    tick_interval: Duration,
}

impl core::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Coordinator")
            .field("clock", &*self.clock.lock())
            .field("simulator_running", &self.is_simulator_running())
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Create a coordinator over the given collaborators.
    pub fn new(store: Arc<dyn Store>, routes: Arc<dyn RouteService>, clock: VirtualClock) -> Self {
        Self {
            store,
            routes,
            clock: Mutex::new(clock),
            observers: Observers::new(),
            simulator: Mutex::new(None),
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    /// Set the wall-clock period between simulator ticks.
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// The change-notification hubs.
    pub const fn observers(&self) -> &Observers {
        &self.observers
    }

    /// The storage collaborator.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Current virtual time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.lock().now()
    }

    /// Move the clock to `to` and run the activity sweep.
    ///
    /// Sweep failures are logged and reported, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidValue`] if `to` is in the virtual
    /// past.
    pub fn advance(&self, to: DateTime<Utc>) -> Result<SweepReport, DispatchError> {
        self.advance_with(|_clock| Ok(to))
    }

    /// Move the clock forward by `step`.
    pub fn advance_by(&self, step: TimeDelta) -> Result<SweepReport, DispatchError> {
        self.advance_with(|clock| clock.after(step))
    }

    /// Move the clock forward by one [`ClockUnit`].
    pub fn advance_unit(&self, unit: ClockUnit) -> Result<SweepReport, DispatchError> {
        self.advance_by(unit.step())
    }

    fn advance_with(
        &self,
        target: impl FnOnce(&VirtualClock) -> Result<DateTime<Utc>, ClockError>,
    ) -> Result<SweepReport, DispatchError> {
        let report = {
            let mut clock = self.clock.lock();
            let to = target(&clock)?;
            let from = clock.set(to)?;
            let report = self.sweep_locked(to);
            debug!(
                from = %from,
                to = %to,
                deactivated = report.deactivated.len(),
                closed = report.closed.len(),
                failures = report.failures,
                "Clock advanced"
            );
            report
        };
        self.publish_advance(&report);
        Ok(report)
    }

    /// Run the activity sweep. Caller holds the global lock.
    fn sweep_locked(&self, now: DateTime<Utc>) -> SweepReport {
        match self.store.config() {
            Ok(config) => activity::sweep(self.store.as_ref(), &config, now),
            Err(err) => {
                warn!(error = %err, "Activity sweep skipped, configuration unreadable");
                SweepReport {
                    failures: 1,
                    ..SweepReport::default()
                }
            }
        }
    }

    fn publish_advance(&self, report: &SweepReport) {
        self.observers.clock.publish_list();

        if !report.deactivated.is_empty() {
            self.observers.couriers.publish_list();
            for id in &report.deactivated {
                self.observers.couriers.publish_entity(id);
            }
        }

        for delivery in &report.closed {
            self.observers.orders.publish_entity(&delivery.order_id);
        }
        if !report.closed.is_empty() {
            self.observers.orders.publish_list();
        }
    }

    fn publish_everything(&self) {
        self.observers.clock.publish_list();
        self.observers.config.publish_list();
        self.observers.orders.publish_list();
        self.observers.couriers.publish_list();
    }

    // -----------------------------------------------------------------------
    // Simulator
    // -----------------------------------------------------------------------

    /// Start advancing the clock by `minutes_per_tick` every tick interval.
    ///
    /// Starting while already running is a no-op, even with a different
    /// rate.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidValue`] for a zero rate and
    /// [`DispatchError::TemporarilyUnavailable`] outside a tokio runtime.
    pub fn start_simulator(self: &Arc<Self>, minutes_per_tick: u32) -> Result<(), DispatchError> {
        let mut slot = self.simulator.lock();
        if let Some(running) = slot.as_ref().filter(|h| h.is_running()) {
            debug!(
                minutes_per_tick = running.minutes_per_tick(),
                "Simulator already running"
            );
            return Ok(());
        }
        *slot = Some(simulator::spawn(
            Arc::downgrade(self),
            minutes_per_tick,
            self.tick_interval,
        )?);
        Ok(())
    }

    /// Request the simulator to stop. An advance already in progress
    /// completes. Calling this when stopped does nothing.
    pub fn stop_simulator(&self) {
        if let Some(handle) = self.simulator.lock().take() {
            handle.cancel();
            info!("Simulator stop requested");
        }
    }

    /// Stop the simulator and wait until its task has exited.
    pub async fn stop_simulator_and_wait(&self) {
        let handle = self.simulator.lock().take();
        if let Some(handle) = handle {
            handle.cancel_and_join().await;
        }
    }

    /// Whether the simulator is running.
    pub fn is_simulator_running(&self) -> bool {
        self.simulator.lock().as_ref().is_some_and(SimulatorHandle::is_running)
    }

    /// Refuse with [`DispatchError::TemporarilyUnavailable`] while the
    /// simulator runs.
    pub fn ensure_simulator_stopped(&self) -> Result<(), DispatchError> {
        if self.is_simulator_running() {
            return Err(DispatchError::unavailable(
                "stop the simulator before running this operation",
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Configuration and administration
    // -----------------------------------------------------------------------

    /// Current business configuration.
    pub fn config(&self) -> Result<DispatchConfig, DispatchError> {
        let _guard = self.clock.lock();
        Ok(self.store.config()?)
    }

    /// Replace the business configuration. Allowed while the simulator
    /// runs; new values apply from the next derivation on.
    pub fn set_config(&self, config: &DispatchConfig) -> Result<(), DispatchError> {
        validate_dispatch(config)?;
        {
            let _guard = self.clock.lock();
            self.store.set_config(config)?;
        }
        info!(
            max_delivery_minutes = config.max_delivery_minutes,
            risk_range_minutes = config.risk_range_minutes,
            inactivity_minutes = config.inactivity_minutes,
            "Configuration updated"
        );
        self.observers.config.publish_list();
        self.observers.orders.publish_list();
        Ok(())
    }

    /// Restore the store's initial business configuration.
    pub fn reset_config(&self) -> Result<(), DispatchError> {
        {
            let _guard = self.clock.lock();
            self.store.reset_config()?;
        }
        info!("Configuration reset");
        self.observers.config.publish_list();
        self.observers.orders.publish_list();
        Ok(())
    }

    /// Clear every entity, reset the configuration and the clock.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TemporarilyUnavailable`] while the
    /// simulator runs.
    pub fn reset_database(&self) -> Result<(), DispatchError> {
        {
            let mut clock = self.clock.lock();
            self.ensure_simulator_stopped()?;
            self.store.reset_database()?;
            clock.reset();
        }
        info!("Database reset");
        self.publish_everything();
        Ok(())
    }

    /// Reset, then write deterministic sample data generated from `seed`.
    pub fn initialize_database(&self, seed: u64) -> Result<SeedSummary, DispatchError> {
        let summary = {
            let mut clock = self.clock.lock();
            self.ensure_simulator_stopped()?;
            self.store.reset_database()?;
            clock.reset();
            let config = self.store.config()?;
            seed::populate(self.store.as_ref(), &config, clock.now(), seed)?
        };
        info!(seed, "Database initialized");
        self.publish_everything();
        Ok(summary)
    }

    // -----------------------------------------------------------------------
    // Workflow
    // -----------------------------------------------------------------------

    /// Route distance from the depot to an order for a courier's vehicle.
    ///
    /// Runs outside the lock. Any failure only means the distance is
    /// unknown.
    fn lookup_distance(&self, order_id: OrderId, courier_id: CourierId) -> Option<f64> {
        let order = self.store.read_order(order_id).ok()?;
        let courier = self.store.read_courier(courier_id).ok()?;
        let config = self.store.config().ok()?;

        let destination = match order.location {
            Some(point) => point,
            None => match self.routes.geocode(&order.address) {
                Ok(point) => point,
                Err(err) => {
                    debug!(order_id = %order_id, error = %err, "Geocoding failed");
                    return None;
                }
            },
        };
        match self
            .routes
            .route_distance(config.depot, destination, courier.vehicle)
        {
            Ok(km) => Some(km),
            Err(err) => {
                debug!(order_id = %order_id, error = %err, "Route distance unavailable");
                None
            }
        }
    }

    /// Assign an order to a courier, opening a delivery at the current
    /// virtual time.
    pub fn assign(&self, order_id: OrderId, courier_id: CourierId) -> Result<Delivery, DispatchError> {
        let distance_km = self.lookup_distance(order_id, courier_id);
        let delivery = {
            let clock = self.clock.lock();
            let config = self.store.config()?;
            workflow::assign(
                self.store.as_ref(),
                &config,
                order_id,
                courier_id,
                clock.now(),
                distance_km,
            )?
        };
        self.observers.orders.publish_entity(&order_id);
        self.observers.orders.publish_list();
        self.observers.couriers.publish_entity(&courier_id);
        self.observers.couriers.publish_list();
        Ok(delivery)
    }

    /// Close an open delivery at the current virtual time.
    pub fn complete_delivery(
        &self,
        delivery_id: DeliveryId,
        outcome: DeliveryOutcome,
    ) -> Result<Delivery, DispatchError> {
        let closed = {
            let clock = self.clock.lock();
            workflow::complete_delivery(self.store.as_ref(), delivery_id, outcome, clock.now())?
        };
        self.observers.orders.publish_entity(&closed.order_id);
        self.observers.orders.publish_list();
        self.observers.couriers.publish_entity(&closed.courier_id);
        self.observers.couriers.publish_list();
        Ok(closed)
    }

    /// Update a courier, canceling its open delivery first when the update
    /// deactivates it.
    pub fn update_courier(
        &self,
        courier_id: CourierId,
        update: &CourierUpdate,
    ) -> Result<CourierChange, DispatchError> {
        let change = {
            let clock = self.clock.lock();
            workflow::update_courier(self.store.as_ref(), courier_id, update, clock.now())?
        };
        if let Some(canceled) = &change.canceled {
            self.observers.orders.publish_entity(&canceled.order_id);
            self.observers.orders.publish_list();
        }
        self.observers.couriers.publish_entity(&courier_id);
        self.observers.couriers.publish_list();
        Ok(change)
    }

    /// Register a new, active courier joining at the current virtual time.
    pub fn create_courier(&self, draft: CourierDraft) -> Result<Courier, DispatchError> {
        let courier = {
            let clock = self.clock.lock();
            let courier = draft.into_courier(clock.now());
            workflow::create_courier(self.store.as_ref(), &courier)?;
            courier
        };
        self.observers.couriers.publish_list();
        Ok(courier)
    }

    /// Delete a courier without delivery history.
    pub fn delete_courier(&self, courier_id: CourierId) -> Result<(), DispatchError> {
        {
            let _guard = self.clock.lock();
            workflow::delete_courier(self.store.as_ref(), courier_id)?;
        }
        self.observers.couriers.publish_list();
        Ok(())
    }

    /// Open a new order at the current virtual time.
    ///
    /// A draft without coordinates is geocoded first, outside the lock.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::TemporarilyUnavailable`] if geocoding
    /// fails; nothing is stored in that case.
    pub fn create_order(&self, mut draft: OrderDraft) -> Result<Order, DispatchError> {
        let depot = self.config()?.depot;
        let location = match draft.location {
            Some(point) => point,
            None => self.routes.geocode(&draft.address)?,
        };
        draft.location = Some(location);
        let air_distance_km = Some(geo::haversine_km(depot, location));

        let order = {
            let clock = self.clock.lock();
            let order = draft.into_order(clock.now(), air_distance_km);
            workflow::create_order(self.store.as_ref(), &order)?;
            order
        };
        self.observers.orders.publish_list();
        Ok(order)
    }

    /// Change an order's descriptive fields. A new address is geocoded
    /// first, outside the lock.
    pub fn update_order(&self, order_id: OrderId, update: &OrderUpdate) -> Result<Order, DispatchError> {
        let mut update = update.clone();
        if let (Some(address), None) = (&update.address, update.location) {
            let depot = self.config()?.depot;
            let location = self.routes.geocode(address)?;
            update.location = Some(location);
            update.air_distance_km = Some(geo::haversine_km(depot, location));
        }

        let order = {
            let _guard = self.clock.lock();
            workflow::update_order(self.store.as_ref(), order_id, &update)?
        };
        self.observers.orders.publish_entity(&order_id);
        self.observers.orders.publish_list();
        Ok(order)
    }

    /// Delete an order that was never assigned.
    pub fn delete_order(&self, order_id: OrderId) -> Result<(), DispatchError> {
        {
            let _guard = self.clock.lock();
            workflow::delete_order(self.store.as_ref(), order_id)?;
        }
        self.observers.orders.publish_list();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// A consistent copy of every table, the configuration and the time.
    pub fn snapshot(&self) -> Result<Snapshot, DispatchError> {
        let clock = self.clock.lock();
        Ok(Snapshot {
            orders: self.store.read_orders(&|_| true)?,
            deliveries: self.store.read_deliveries(&|_| true)?,
            couriers: self.store.read_couriers(&|_| true)?,
            config: self.store.config()?,
            now: clock.now(),
        })
    }

    /// Derived state of one order.
    pub fn order_summary(&self, order_id: OrderId) -> Result<OrderSummary, DispatchError> {
        self.snapshot()?
            .order_summary(order_id)
            .ok_or_else(|| DispatchError::NotFound {
                entity: "order",
                id: order_id.to_string(),
            })
    }

    /// Derived state of every order, oldest first.
    pub fn order_summaries(&self) -> Result<Vec<OrderSummary>, DispatchError> {
        Ok(self.snapshot()?.order_summaries())
    }

    /// Order counts by status and schedule status.
    pub fn order_counts(&self) -> Result<OrderCounts, DispatchError> {
        Ok(self.snapshot()?.order_counts())
    }

    /// Every courier with delivery statistics.
    pub fn courier_summaries(&self) -> Result<Vec<CourierSummary>, DispatchError> {
        Ok(self.snapshot()?.courier_summaries())
    }

    /// Closed deliveries of a courier, newest first.
    pub fn courier_history(&self, courier_id: CourierId) -> Result<Vec<Delivery>, DispatchError> {
        let snapshot = self.snapshot()?;
        if !snapshot.couriers.iter().any(|c| c.id == courier_id) {
            return Err(DispatchError::NotFound {
                entity: "courier",
                id: courier_id.to_string(),
            });
        }
        Ok(snapshot.courier_history(courier_id))
    }

    /// Scheduled orders within a courier's reach, nearest first.
    pub fn open_orders_for_courier(
        &self,
        courier_id: CourierId,
    ) -> Result<Vec<OrderSummary>, DispatchError> {
        let snapshot = self.snapshot()?;
        if !snapshot.couriers.iter().any(|c| c.id == courier_id) {
            return Err(DispatchError::NotFound {
                entity: "courier",
                id: courier_id.to_string(),
            });
        }
        Ok(snapshot.open_orders_for_courier(courier_id))
    }
}
