//! Assignment, completion and courier lifecycle workflow.
//!
//! Every function here is the *locked half* of a coordinator operation:
//! it reads its preconditions and writes its changes through the store
//! while the coordinator holds the global lock, and returns what changed
//! so the coordinator can publish after unlocking. Route lookups never
//! happen here; their results come in as plain values.
//!
//! Preconditions are all checked before the first write. The only
//! multi-write sequence, the deactivation cascade, restores what it wrote
//! if a later step fails.

use chrono::{DateTime, Utc};
use dispatch_db::Store;
use dispatch_types::{
    Courier, CourierId, CourierUpdate, Delivery, DeliveryId, DeliveryOutcome, DispatchConfig,
    GeoPoint, Order, OrderId, OrderStatus, OrderType, OrderUpdate, VehicleKind,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::DispatchError;
use crate::status;

/// Fields of a new order. Identity and creation time are assigned by the
/// coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    /// Kind of goods.
    pub order_type: OrderType,
    /// Customer full name.
    pub customer_name: String,
    /// Customer phone number.
    pub customer_phone: String,
    /// Delivery address.
    pub address: String,
    /// Coordinates, when the caller already knows them.
    pub location: Option<GeoPoint>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Parcel volume in litres.
    pub volume_liters: Option<f64>,
    /// Whether the parcel is fragile.
    pub is_fragile: bool,
}

impl OrderDraft {
    /// Build the order record.
    pub fn into_order(self, created_at: DateTime<Utc>, air_distance_km: Option<f64>) -> Order {
        Order {
            id: OrderId::new(),
            order_type: self.order_type,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            address: self.address,
            location: self.location,
            air_distance_km,
            notes: self.notes,
            volume_liters: self.volume_liters,
            is_fragile: self.is_fragile,
            created_at,
        }
    }
}

/// Fields of a new courier. New couriers start active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierDraft {
    /// Full name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Vehicle.
    pub vehicle: VehicleKind,
    /// Personal maximum delivery distance in kilometres.
    pub max_distance_km: Option<f64>,
}

impl CourierDraft {
    /// Build the courier record.
    pub fn into_courier(self, joined_at: DateTime<Utc>) -> Courier {
        Courier {
            id: CourierId::new(),
            name: self.name,
            phone: self.phone,
            email: self.email,
            active: true,
            vehicle: self.vehicle,
            joined_at,
            max_distance_km: self.max_distance_km,
        }
    }
}

/// Result of a courier update.
#[derive(Debug, Clone, PartialEq)]
pub struct CourierChange {
    /// The courier as stored after the update.
    pub courier: Courier,
    /// The delivery the deactivation cascade canceled, if any.
    pub canceled: Option<Delivery>,
}

fn check_distance_limit(value: Option<f64>, what: &str) -> Result<(), DispatchError> {
    match value {
        Some(km) if !(km.is_finite() && km > 0.0) => Err(DispatchError::invalid(format!(
            "{what} must be a positive number of kilometres, got {km}"
        ))),
        _ => Ok(()),
    }
}

/// The tightest distance limit that applies to a courier.
pub fn distance_limit(courier: &Courier, config: &DispatchConfig) -> Option<f64> {
    match (courier.max_distance_km, config.max_range_km) {
        (Some(own), Some(company)) => Some(own.min(company)),
        (own, company) => own.or(company),
    }
}

/// Pair an order with a courier by opening a delivery at `now`.
pub fn assign(
    store: &dyn Store,
    config: &DispatchConfig,
    order_id: OrderId,
    courier_id: CourierId,
    now: DateTime<Utc>,
    distance_km: Option<f64>,
) -> Result<Delivery, DispatchError> {
    let order = store.read_order(order_id)?;
    let courier = store.read_courier(courier_id)?;

    if !courier.active {
        return Err(DispatchError::invalid(format!(
            "courier {courier_id} is inactive"
        )));
    }

    let history = store.deliveries_of_order(order_id)?;
    match status::derive_order_status(&order, &history) {
        OrderStatus::Scheduled => {}
        OrderStatus::InTreatment => {
            return Err(DispatchError::invalid(format!(
                "order {order_id} already has an open delivery"
            )));
        }
        terminal => {
            return Err(DispatchError::invalid(format!(
                "order {order_id} is closed ({terminal:?})"
            )));
        }
    }

    if !store.open_deliveries_of_courier(courier_id)?.is_empty() {
        return Err(DispatchError::invalid(format!(
            "courier {courier_id} already has an open delivery"
        )));
    }

    if let (Some(limit), Some(km)) = (distance_limit(&courier, config), distance_km) {
        if km > limit {
            return Err(DispatchError::invalid(format!(
                "order {order_id} is {km:.1} km away, beyond the {limit:.1} km limit of courier {courier_id}"
            )));
        }
    }

    let delivery = Delivery::open(order_id, courier_id, courier.vehicle, now, distance_km);
    store.create_delivery(&delivery)?;
    debug!(
        delivery_id = %delivery.id,
        order_id = %order_id,
        courier_id = %courier_id,
        "Order assigned"
    );
    Ok(delivery)
}

/// Close an open delivery at `now` with `outcome`.
pub fn complete_delivery(
    store: &dyn Store,
    delivery_id: DeliveryId,
    outcome: DeliveryOutcome,
    now: DateTime<Utc>,
) -> Result<Delivery, DispatchError> {
    let delivery = store.read_delivery(delivery_id)?;
    let closed = status::close_delivery(&delivery, now, outcome)?;
    store.update_delivery(&closed)?;
    debug!(delivery_id = %delivery_id, outcome = ?outcome, "Delivery completed");
    Ok(closed)
}

/// Apply a courier update, running the deactivation cascade when the
/// update turns an active courier inactive.
pub fn update_courier(
    store: &dyn Store,
    courier_id: CourierId,
    update: &CourierUpdate,
    now: DateTime<Utc>,
) -> Result<CourierChange, DispatchError> {
    check_distance_limit(update.max_distance_km.flatten(), "max distance")?;
    let current = store.read_courier(courier_id)?;
    let updated = current.with_update(update);

    if !current.is_deactivated_by(update) {
        store.update_courier(&updated)?;
        debug!(courier_id = %courier_id, "Courier updated");
        return Ok(CourierChange {
            courier: updated,
            canceled: None,
        });
    }

    // --- Deactivation cascade ---
    let open = store.open_deliveries_of_courier(courier_id)?.into_iter().next();
    let canceled = match &open {
        Some(delivery) => {
            let canceled = status::close_delivery(delivery, now, DeliveryOutcome::Canceled)?;
            store.update_delivery(&canceled)?;
            Some(canceled)
        }
        None => None,
    };

    if let Err(err) = store.update_courier(&updated) {
        if let Some(original) = &open {
            if let Err(restore) = store.update_delivery(original) {
                error!(
                    delivery_id = %original.id,
                    error = %restore,
                    "Failed to restore delivery after courier update failure"
                );
            }
        }
        return Err(err.into());
    }

    info!(
        courier_id = %courier_id,
        canceled = ?canceled.as_ref().map(|d| d.id),
        "Courier deactivated"
    );
    Ok(CourierChange {
        courier: updated,
        canceled,
    })
}

/// Store a new courier.
pub fn create_courier(store: &dyn Store, courier: &Courier) -> Result<(), DispatchError> {
    check_distance_limit(courier.max_distance_km, "max distance")?;
    store.create_courier(courier)?;
    debug!(courier_id = %courier.id, "Courier created");
    Ok(())
}

/// Delete a courier that has never delivered anything.
pub fn delete_courier(store: &dyn Store, courier_id: CourierId) -> Result<(), DispatchError> {
    store.read_courier(courier_id)?;
    let history = store.deliveries_of_courier(courier_id)?;
    if history.iter().any(Delivery::is_open) {
        return Err(DispatchError::blocked(format!(
            "courier {courier_id} has an open delivery"
        )));
    }
    if !history.is_empty() {
        return Err(DispatchError::blocked(format!(
            "courier {courier_id} has delivery history; deactivate instead"
        )));
    }
    store.delete_courier(courier_id)?;
    debug!(courier_id = %courier_id, "Courier deleted");
    Ok(())
}

/// Store a new order.
pub fn create_order(store: &dyn Store, order: &Order) -> Result<(), DispatchError> {
    store.create_order(order)?;
    debug!(order_id = %order.id, "Order created");
    Ok(())
}

/// Apply descriptive changes to an order.
pub fn update_order(
    store: &dyn Store,
    order_id: OrderId,
    update: &OrderUpdate,
) -> Result<Order, DispatchError> {
    let updated = store.read_order(order_id)?.with_update(update);
    store.update_order(&updated)?;
    debug!(order_id = %order_id, "Order updated");
    Ok(updated)
}

/// Delete an order that was never handed to a courier.
pub fn delete_order(store: &dyn Store, order_id: OrderId) -> Result<(), DispatchError> {
    store.read_order(order_id)?;
    if !store.deliveries_of_order(order_id)?.is_empty() {
        return Err(DispatchError::blocked(format!(
            "order {order_id} has delivery history"
        )));
    }
    store.delete_order(order_id)?;
    debug!(order_id = %order_id, "Order deleted");
    Ok(())
}
