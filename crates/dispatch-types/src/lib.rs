//! Shared type definitions for the delivery dispatch coordinator.
//!
//! This crate is the single source of truth for the entities exchanged
//! between the store, the core coordinator and its consumers. Types
//! flow downstream to `TypeScript` via `ts-rs` for dashboard consumers.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for orders, deliveries and couriers
//! - [`enums`] -- Recorded facts (order type, vehicle, outcome) and derived
//!   statuses (order status, schedule status)
//! - [`structs`] -- Entity structs, their override types, and the business
//!   configuration

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{DeliveryOutcome, OrderStatus, OrderType, ScheduleStatus, VehicleKind};
pub use ids::{CourierId, DeliveryId, OrderId};
pub use structs::{
    Courier, CourierUpdate, Delivery, DispatchConfig, GeoPoint, Order, OrderUpdate,
};
