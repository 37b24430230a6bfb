//! Core entity structs for the dispatch domain.
//!
//! Entities are plain values. Updates never mutate a stored record in
//! place: [`Order::with_update`], [`Courier::with_update`] and
//! [`Delivery::closed`] each return a new value built from an existing one
//! plus a set of overrides, and the store replaces the old record.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DeliveryOutcome, OrderType, VehicleKind};
use crate::ids::{CourierId, DeliveryId, OrderId};

// ---------------------------------------------------------------------------
// Geography
// ---------------------------------------------------------------------------

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    /// Create a coordinate pair.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A customer order waiting for, or going through, delivery.
///
/// Status fields are deliberately absent: see `OrderStatus` and
/// `ScheduleStatus`, which are derived on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Order {
    /// Order identity (immutable).
    pub id: OrderId,
    /// Kind of goods.
    pub order_type: OrderType,
    /// Customer full name.
    pub customer_name: String,
    /// Customer phone number.
    pub customer_phone: String,
    /// Delivery address as entered.
    pub address: String,
    /// Geocoded address, when known.
    pub location: Option<GeoPoint>,
    /// Great-circle distance from the depot in kilometres, when known.
    pub air_distance_km: Option<f64>,
    /// Free-text delivery notes.
    pub notes: Option<String>,
    /// Parcel volume in litres.
    pub volume_liters: Option<f64>,
    /// Whether the parcel needs careful handling.
    pub is_fragile: bool,
    /// Virtual time at which the order was opened (immutable).
    pub created_at: DateTime<Utc>,
}

/// Field overrides applied by [`Order::with_update`].
///
/// `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    /// New order type.
    pub order_type: Option<OrderType>,
    /// New customer name.
    pub customer_name: Option<String>,
    /// New customer phone.
    pub customer_phone: Option<String>,
    /// New address. Clears the geocoded location unless `location` is also set.
    pub address: Option<String>,
    /// New geocoded location.
    pub location: Option<GeoPoint>,
    /// New distance from the depot.
    pub air_distance_km: Option<f64>,
    /// New notes.
    pub notes: Option<String>,
    /// New parcel volume.
    pub volume_liters: Option<f64>,
    /// New fragility flag.
    pub is_fragile: Option<bool>,
}

impl Order {
    /// Return a copy of this order with the given overrides applied.
    ///
    /// Identity and creation time are never overridden. Changing the
    /// address without supplying a location drops the stale coordinates
    /// and distance.
    #[must_use]
    pub fn with_update(&self, update: &OrderUpdate) -> Self {
        let address_changed = update
            .address
            .as_ref()
            .is_some_and(|addr| *addr != self.address);

        let (location, air_distance_km) = match (update.location, address_changed) {
            (Some(point), _) => (Some(point), update.air_distance_km),
            (None, true) => (None, None),
            (None, false) => (
                self.location,
                update.air_distance_km.or(self.air_distance_km),
            ),
        };

        Self {
            id: self.id,
            order_type: update.order_type.unwrap_or(self.order_type),
            customer_name: update
                .customer_name
                .clone()
                .unwrap_or_else(|| self.customer_name.clone()),
            customer_phone: update
                .customer_phone
                .clone()
                .unwrap_or_else(|| self.customer_phone.clone()),
            address: update
                .address
                .clone()
                .unwrap_or_else(|| self.address.clone()),
            location,
            air_distance_km,
            notes: update.notes.clone().or_else(|| self.notes.clone()),
            volume_liters: update.volume_liters.or(self.volume_liters),
            is_fragile: update.is_fragile.unwrap_or(self.is_fragile),
            created_at: self.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

/// One attempt to deliver an order, owned by one courier.
///
/// A delivery is *open* while `end_time` is `None`. Closed deliveries are
/// append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Delivery {
    /// Delivery identity.
    pub id: DeliveryId,
    /// The order being delivered.
    pub order_id: OrderId,
    /// The courier carrying the order.
    pub courier_id: CourierId,
    /// Courier vehicle at assignment time.
    pub vehicle: VehicleKind,
    /// Virtual time the courier picked the order up.
    pub start_time: DateTime<Utc>,
    /// Virtual time the attempt ended.
    pub end_time: Option<DateTime<Utc>>,
    /// How the attempt ended.
    pub outcome: Option<DeliveryOutcome>,
    /// Route distance from the depot in kilometres, when it was known.
    pub distance_km: Option<f64>,
}

impl Delivery {
    /// Start a new open delivery.
    pub fn open(
        order_id: OrderId,
        courier_id: CourierId,
        vehicle: VehicleKind,
        start_time: DateTime<Utc>,
        distance_km: Option<f64>,
    ) -> Self {
        Self {
            id: DeliveryId::new(),
            order_id,
            courier_id,
            vehicle,
            start_time,
            end_time: None,
            outcome: None,
            distance_km,
        }
    }

    /// Whether the attempt is still in progress.
    pub const fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Return a closed copy of this delivery.
    ///
    /// This is a plain copy-with-overrides; the rules about *when* a
    /// delivery may be closed live in the core status engine.
    #[must_use]
    pub fn closed(&self, at: DateTime<Utc>, outcome: DeliveryOutcome) -> Self {
        Self {
            end_time: Some(at),
            outcome: Some(outcome),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Courier
// ---------------------------------------------------------------------------

/// A courier who can be assigned orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Courier {
    /// Courier identity.
    pub id: CourierId,
    /// Full name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Whether the courier can take new orders.
    pub active: bool,
    /// Vehicle used for deliveries.
    pub vehicle: VehicleKind,
    /// Virtual time the courier joined.
    pub joined_at: DateTime<Utc>,
    /// Personal maximum delivery distance in kilometres.
    pub max_distance_km: Option<f64>,
}

/// Field overrides applied by [`Courier::with_update`].
///
/// `None` keeps the current value. `max_distance_km: Some(None)` clears
/// the personal limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierUpdate {
    /// New name.
    pub name: Option<String>,
    /// New phone.
    pub phone: Option<String>,
    /// New email.
    pub email: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
    /// New vehicle.
    pub vehicle: Option<VehicleKind>,
    /// New personal distance limit.
    pub max_distance_km: Option<Option<f64>>,
}

impl CourierUpdate {
    /// An update that only flips the active flag.
    pub fn active(active: bool) -> Self {
        Self {
            active: Some(active),
            ..Self::default()
        }
    }
}

impl Courier {
    /// Return a copy of this courier with the given overrides applied.
    #[must_use]
    pub fn with_update(&self, update: &CourierUpdate) -> Self {
        Self {
            id: self.id,
            name: update.name.clone().unwrap_or_else(|| self.name.clone()),
            phone: update.phone.clone().unwrap_or_else(|| self.phone.clone()),
            email: update.email.clone().unwrap_or_else(|| self.email.clone()),
            active: update.active.unwrap_or(self.active),
            vehicle: update.vehicle.unwrap_or(self.vehicle),
            joined_at: self.joined_at,
            max_distance_km: update.max_distance_km.unwrap_or(self.max_distance_km),
        }
    }

    /// Whether applying `update` turns an active courier inactive.
    pub fn is_deactivated_by(&self, update: &CourierUpdate) -> bool {
        self.active && update.active == Some(false)
    }
}

// ---------------------------------------------------------------------------
// Business configuration
// ---------------------------------------------------------------------------

/// Global dispatch parameters.
///
/// Durations are whole minutes. Changes apply prospectively: statuses are
/// derived on read, so nothing already recorded is rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DispatchConfig {
    /// Time allowed from order creation to delivery.
    #[serde(default = "default_max_delivery_minutes")]
    pub max_delivery_minutes: u32,

    /// Length of the risk window that ends at the deadline.
    #[serde(default = "default_risk_range_minutes")]
    pub risk_range_minutes: u32,

    /// Idle time after which a courier is deactivated.
    #[serde(default = "default_inactivity_minutes")]
    pub inactivity_minutes: u32,

    /// Average car speed in km/h.
    #[serde(default = "default_car_speed_kmh")]
    pub car_speed_kmh: f64,

    /// Average motorcycle speed in km/h.
    #[serde(default = "default_motorcycle_speed_kmh")]
    pub motorcycle_speed_kmh: f64,

    /// Average bicycle speed in km/h.
    #[serde(default = "default_bicycle_speed_kmh")]
    pub bicycle_speed_kmh: f64,

    /// Average walking speed in km/h.
    #[serde(default = "default_foot_speed_kmh")]
    pub foot_speed_kmh: f64,

    /// Company-wide maximum delivery range in kilometres.
    #[serde(default)]
    pub max_range_km: Option<f64>,

    /// Depot address.
    #[serde(default = "default_depot_address")]
    pub depot_address: String,

    /// Depot coordinates, the origin of every delivery.
    #[serde(default = "default_depot")]
    pub depot: GeoPoint,
}

impl DispatchConfig {
    /// Time allowed from creation to delivery.
    pub fn max_delivery_time(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.max_delivery_minutes))
    }

    /// Length of the risk window before the deadline.
    pub fn risk_range(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.risk_range_minutes))
    }

    /// Idle time after which a courier is deactivated.
    pub fn inactivity_range(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.inactivity_minutes))
    }

    /// Average speed for a vehicle kind in km/h.
    pub const fn speed_kmh(&self, vehicle: VehicleKind) -> f64 {
        match vehicle {
            VehicleKind::Car => self.car_speed_kmh,
            VehicleKind::Motorcycle => self.motorcycle_speed_kmh,
            VehicleKind::Bicycle => self.bicycle_speed_kmh,
            VehicleKind::OnFoot => self.foot_speed_kmh,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_delivery_minutes: default_max_delivery_minutes(),
            risk_range_minutes: default_risk_range_minutes(),
            inactivity_minutes: default_inactivity_minutes(),
            car_speed_kmh: default_car_speed_kmh(),
            motorcycle_speed_kmh: default_motorcycle_speed_kmh(),
            bicycle_speed_kmh: default_bicycle_speed_kmh(),
            foot_speed_kmh: default_foot_speed_kmh(),
            max_range_km: None,
            depot_address: default_depot_address(),
            depot: default_depot(),
        }
    }
}

const fn default_max_delivery_minutes() -> u32 {
    120
}

const fn default_risk_range_minutes() -> u32 {
    15
}

const fn default_inactivity_minutes() -> u32 {
    // three days
    4_320
}

const fn default_car_speed_kmh() -> f64 {
    30.0
}

const fn default_motorcycle_speed_kmh() -> f64 {
    40.0
}

const fn default_bicycle_speed_kmh() -> f64 {
    15.0
}

const fn default_foot_speed_kmh() -> f64 {
    5.0
}

fn default_depot_address() -> String {
    "Jaffa Rd 1, Jerusalem".to_owned()
}

const fn default_depot() -> GeoPoint {
    GeoPoint::new(31.7857, 35.2007)
}
