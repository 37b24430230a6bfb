//! Virtual clock, status derivation and dispatch workflow for the delivery
//! coordinator.
//!
//! This crate owns the single logical clock that drives every
//! time-dependent fact in the dispatch domain. Manual advances and the
//! autonomous simulator go through the same global lock; each advance runs
//! the courier activity sweep inside that lock and notifies observers
//! after releasing it.
//!
//! # Modules
//!
//! - [`coordinator`] -- [`Coordinator`], the stateful service owning the
//!   clock, the global lock, the observer hubs and the simulator.
//! - [`clock`] -- The virtual clock value and its fixed steps.
//! - `simulator` -- The cancellable background task that ticks the clock.
//! - [`status`] -- Pure derivation of order and schedule status.
//! - [`activity`] -- The per-advance inactivity sweep.
//! - [`workflow`] -- Assignment, completion and the deactivation cascade.
//! - [`views`] -- Read-side summaries computed from consistent snapshots.
//! - [`observer`] -- List-level and per-entity change notification.
//! - [`geo`] -- Geocoding and route-distance collaborator.
//! - [`seed`] -- Deterministic sample data.
//! - [`config`] -- Configuration loading from `dispatch-config.yaml`.
//! - [`error`] -- The error taxonomy surfaced to callers.
//!
//! [`Coordinator`]: coordinator::Coordinator

pub mod activity;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod geo;
pub mod observer;
pub mod seed;
mod simulator;
pub mod status;
pub mod views;
pub mod workflow;

pub use clock::{ClockUnit, VirtualClock};
pub use coordinator::Coordinator;
pub use error::DispatchError;
pub use observer::{Observer, observer};
