//! Enumeration types for the dispatch domain.
//!
//! [`OrderStatus`] and [`ScheduleStatus`] are never stored: they are
//! derived from delivery history and the virtual clock every time they are
//! read. The remaining enums describe facts recorded on entities.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Recorded facts
// ---------------------------------------------------------------------------

/// The kind of goods an order carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum OrderType {
    /// Prepared meals.
    Food,
    /// Supermarket goods.
    Groceries,
    /// Appliances and devices.
    Electronics,
    /// Letters and paperwork.
    Documents,
    /// Medicine and pharmacy goods.
    Pharmacy,
}

/// The vehicle a courier uses for deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum VehicleKind {
    /// Private car.
    Car,
    /// Motorcycle or scooter.
    Motorcycle,
    /// Bicycle.
    Bicycle,
    /// Walking courier.
    OnFoot,
}

/// How a delivery attempt ended.
///
/// `Delivered`, `Refused` and `Canceled` close the order for good.
/// `NotThere` and `Failed` are transient: the attempt is history but the
/// order goes back to the assignable pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DeliveryOutcome {
    /// The customer received the goods.
    Delivered,
    /// The customer refused the goods.
    Refused,
    /// The delivery was canceled by a deliberate human action.
    Canceled,
    /// Nobody was at the address.
    NotThere,
    /// The attempt failed for a technical or system reason.
    Failed,
}

impl DeliveryOutcome {
    /// Whether this outcome closes the order permanently.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Refused | Self::Canceled)
    }
}

// ---------------------------------------------------------------------------
// Derived statuses
// ---------------------------------------------------------------------------

/// Lifecycle position of an order, derived from its latest delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum OrderStatus {
    /// Waiting for a courier (no attempt yet, or the last one was transient).
    Scheduled,
    /// A courier currently holds the order.
    InTreatment,
    /// Handed to the customer.
    Delivered,
    /// The customer refused the goods.
    CustomerRefused,
    /// Canceled.
    Canceled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Scheduled,
        Self::InTreatment,
        Self::Delivered,
        Self::CustomerRefused,
        Self::Canceled,
    ];

    /// Whether the order can no longer change status.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::CustomerRefused | Self::Canceled
        )
    }
}

/// Position of an order relative to its delivery deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ScheduleStatus {
    /// Comfortably before the risk window (or closed in time).
    OnTime,
    /// Inside the risk window that precedes the deadline.
    Risk,
    /// Past the deadline (or closed after it).
    Late,
}

impl ScheduleStatus {
    /// Every schedule status.
    pub const ALL: [Self; 3] = [Self::OnTime, Self::Risk, Self::Late];
}
