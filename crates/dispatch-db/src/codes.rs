//! Translation tables between business enums and storage codes.
//!
//! Stored rows carry short string codes. Every table is an exhaustive
//! `match` in both directions: adding a variant to a business enum fails
//! to compile until its code is added here, and reading a code with no
//! mapping fails with [`StoreError::UnknownCode`] instead of falling back
//! to a default.

use dispatch_types::{DeliveryOutcome, OrderType, VehicleKind};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Vehicle
// ---------------------------------------------------------------------------

/// Storage code for a vehicle kind.
pub const fn vehicle_to_code(vehicle: VehicleKind) -> &'static str {
    match vehicle {
        VehicleKind::Car => "car",
        VehicleKind::Motorcycle => "motorcycle",
        VehicleKind::Bicycle => "bicycle",
        VehicleKind::OnFoot => "foot",
    }
}

/// Vehicle kind for a storage code.
pub fn vehicle_from_code(code: &str) -> Result<VehicleKind, StoreError> {
    match code {
        "car" => Ok(VehicleKind::Car),
        "motorcycle" => Ok(VehicleKind::Motorcycle),
        "bicycle" => Ok(VehicleKind::Bicycle),
        "foot" => Ok(VehicleKind::OnFoot),
        other => Err(unknown("vehicle", other)),
    }
}

// ---------------------------------------------------------------------------
// Delivery outcome
// ---------------------------------------------------------------------------

/// Storage code for a delivery outcome.
pub const fn outcome_to_code(outcome: DeliveryOutcome) -> &'static str {
    match outcome {
        DeliveryOutcome::Delivered => "delivered",
        DeliveryOutcome::Refused => "refused",
        DeliveryOutcome::Canceled => "canceled",
        DeliveryOutcome::NotThere => "not_there",
        DeliveryOutcome::Failed => "failed",
    }
}

/// Delivery outcome for a storage code.
pub fn outcome_from_code(code: &str) -> Result<DeliveryOutcome, StoreError> {
    match code {
        "delivered" => Ok(DeliveryOutcome::Delivered),
        "refused" => Ok(DeliveryOutcome::Refused),
        "canceled" => Ok(DeliveryOutcome::Canceled),
        "not_there" => Ok(DeliveryOutcome::NotThere),
        "failed" => Ok(DeliveryOutcome::Failed),
        other => Err(unknown("outcome", other)),
    }
}

// ---------------------------------------------------------------------------
// Order type
// ---------------------------------------------------------------------------

/// Storage code for an order type.
pub const fn order_type_to_code(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Food => "food",
        OrderType::Groceries => "groceries",
        OrderType::Electronics => "electronics",
        OrderType::Documents => "documents",
        OrderType::Pharmacy => "pharmacy",
    }
}

/// Order type for a storage code.
pub fn order_type_from_code(code: &str) -> Result<OrderType, StoreError> {
    match code {
        "food" => Ok(OrderType::Food),
        "groceries" => Ok(OrderType::Groceries),
        "electronics" => Ok(OrderType::Electronics),
        "documents" => Ok(OrderType::Documents),
        "pharmacy" => Ok(OrderType::Pharmacy),
        other => Err(unknown("order type", other)),
    }
}

fn unknown(kind: &'static str, code: &str) -> StoreError {
    StoreError::UnknownCode {
        kind,
        code: code.to_owned(),
    }
}
