//! Storage collaborator for the dispatch coordinator.
//!
//! The core treats storage as an external request/response service. This
//! crate defines that contract ([`Store`]), the stored row shapes with
//! their code translation tables, and an in-memory implementation used by
//! the engine binary and the test suites.
//!
//! # Architecture
//!
//! ```text
//! dispatch-core (holds the global lock)
//!     |
//!     +-- Store trait ----------> MemoryStore (rows keyed by id)
//!                                    |
//!                                    +-- codes: enum <-> storage code tables
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`Store`] trait
//! - [`memory`] -- [`MemoryStore`], the in-process implementation
//! - [`rows`] -- Stored row shapes and entity conversion
//! - [`codes`] -- Exhaustive enum/code translation tables
//! - [`error`] -- Shared error types

pub mod codes;
pub mod error;
pub mod memory;
pub mod rows;
pub mod store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use memory::MemoryStore;
pub use rows::{CourierRow, DeliveryRow, OrderRow};
pub use store::{CourierHistories, Store};
