//! Stored row shapes.
//!
//! Rows mirror the entities except that enum fields are kept as storage
//! codes. Converting a row back into an entity goes through the
//! translation tables in [`crate::codes`] and can therefore fail.

use chrono::{DateTime, Utc};
use dispatch_types::{
    Courier, CourierId, Delivery, DeliveryId, GeoPoint, Order, OrderId,
};

use crate::codes;
use crate::error::StoreError;

/// A stored order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    /// Order identity.
    pub id: OrderId,
    /// Order type code.
    pub order_type: String,
    /// Customer name.
    pub customer_name: String,
    /// Customer phone.
    pub customer_phone: String,
    /// Address.
    pub address: String,
    /// Latitude, when geocoded.
    pub lat: Option<f64>,
    /// Longitude, when geocoded.
    pub lon: Option<f64>,
    /// Distance from the depot.
    pub air_distance_km: Option<f64>,
    /// Notes.
    pub notes: Option<String>,
    /// Volume in litres.
    pub volume_liters: Option<f64>,
    /// Fragility flag.
    pub is_fragile: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            order_type: codes::order_type_to_code(order.order_type).to_owned(),
            customer_name: order.customer_name.clone(),
            customer_phone: order.customer_phone.clone(),
            address: order.address.clone(),
            lat: order.location.map(|p| p.lat),
            lon: order.location.map(|p| p.lon),
            air_distance_km: order.air_distance_km,
            notes: order.notes.clone(),
            volume_liters: order.volume_liters,
            is_fragile: order.is_fragile,
            created_at: order.created_at,
        }
    }
}

impl TryFrom<&OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: &OrderRow) -> Result<Self, Self::Error> {
        let location = match (row.lat, row.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        };
        Ok(Self {
            id: row.id,
            order_type: codes::order_type_from_code(&row.order_type)?,
            customer_name: row.customer_name.clone(),
            customer_phone: row.customer_phone.clone(),
            address: row.address.clone(),
            location,
            air_distance_km: row.air_distance_km,
            notes: row.notes.clone(),
            volume_liters: row.volume_liters,
            is_fragile: row.is_fragile,
            created_at: row.created_at,
        })
    }
}

/// A stored delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRow {
    /// Delivery identity.
    pub id: DeliveryId,
    /// Owning order.
    pub order_id: OrderId,
    /// Owning courier.
    pub courier_id: CourierId,
    /// Vehicle code.
    pub vehicle: String,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// End time, absent while open.
    pub end_time: Option<DateTime<Utc>>,
    /// Outcome code, absent while open.
    pub outcome: Option<String>,
    /// Route distance.
    pub distance_km: Option<f64>,
}

impl From<&Delivery> for DeliveryRow {
    fn from(delivery: &Delivery) -> Self {
        Self {
            id: delivery.id,
            order_id: delivery.order_id,
            courier_id: delivery.courier_id,
            vehicle: codes::vehicle_to_code(delivery.vehicle).to_owned(),
            start_time: delivery.start_time,
            end_time: delivery.end_time,
            outcome: delivery
                .outcome
                .map(|o| codes::outcome_to_code(o).to_owned()),
            distance_km: delivery.distance_km,
        }
    }
}

impl TryFrom<&DeliveryRow> for Delivery {
    type Error = StoreError;

    fn try_from(row: &DeliveryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            courier_id: row.courier_id,
            vehicle: codes::vehicle_from_code(&row.vehicle)?,
            start_time: row.start_time,
            end_time: row.end_time,
            outcome: row
                .outcome
                .as_deref()
                .map(codes::outcome_from_code)
                .transpose()?,
            distance_km: row.distance_km,
        })
    }
}

/// A stored courier.
#[derive(Debug, Clone, PartialEq)]
pub struct CourierRow {
    /// Courier identity.
    pub id: CourierId,
    /// Name.
    pub name: String,
    /// Phone.
    pub phone: String,
    /// Email.
    pub email: String,
    /// Active flag.
    pub active: bool,
    /// Vehicle code.
    pub vehicle: String,
    /// Join date.
    pub joined_at: DateTime<Utc>,
    /// Personal distance limit.
    pub max_distance_km: Option<f64>,
}

impl From<&Courier> for CourierRow {
    fn from(courier: &Courier) -> Self {
        Self {
            id: courier.id,
            name: courier.name.clone(),
            phone: courier.phone.clone(),
            email: courier.email.clone(),
            active: courier.active,
            vehicle: codes::vehicle_to_code(courier.vehicle).to_owned(),
            joined_at: courier.joined_at,
            max_distance_km: courier.max_distance_km,
        }
    }
}

impl TryFrom<&CourierRow> for Courier {
    type Error = StoreError;

    fn try_from(row: &CourierRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name.clone(),
            phone: row.phone.clone(),
            email: row.email.clone(),
            active: row.active,
            vehicle: codes::vehicle_from_code(&row.vehicle)?,
            joined_at: row.joined_at,
            max_distance_km: row.max_distance_km,
        })
    }
}
