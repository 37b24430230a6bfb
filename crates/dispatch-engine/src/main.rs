//! Dispatch coordinator binary.
//!
//! Wires the memory store, the offline route service and the coordinator
//! together, seeds sample data, and lets the simulator drive the virtual
//! clock until Ctrl-C or the configured real-time limit.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `dispatch-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the store, route service and coordinator
//! 4. Seed sample data
//! 5. Attach logging observers
//! 6. Start the simulator
//! 7. Wait for shutdown, stop the simulator, log the result

mod error;
mod observer_log;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dispatch_core::Coordinator;
use dispatch_core::config::{EngineConfig, LoggingConfig};
use dispatch_core::geo::OfflineRoutes;
use dispatch_db::MemoryStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::observer_log::ChangeLog;

/// Configuration file, relative to the working directory.
const CONFIG_PATH: &str = "dispatch-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging setup, seeding or the
/// shutdown signal fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = EngineConfig::from_file_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!(
        max_delivery_minutes = config.dispatch.max_delivery_minutes,
        risk_range_minutes = config.dispatch.risk_range_minutes,
        inactivity_minutes = config.dispatch.inactivity_minutes,
        minutes_per_tick = config.simulator.minutes_per_tick,
        tick_interval_ms = config.simulator.tick_interval_ms,
        "dispatch-engine starting"
    );

    // 3. Assemble the coordinator.
    let store = Arc::new(MemoryStore::with_config(config.dispatch.clone()));
    let routes = Arc::new(OfflineRoutes::with_sample_addresses());
    let coordinator = Arc::new(
        Coordinator::new(store, routes, config.virtual_clock())
            .with_tick_interval(config.simulator.tick_interval()),
    );
    info!(now = %coordinator.now(), "Virtual clock initialized");

    // 4. Seed sample data.
    if config.seed.enabled {
        let summary = coordinator.initialize_database(config.seed.seed)?;
        info!(
            seed = config.seed.seed,
            couriers = summary.couriers,
            orders = summary.orders,
            deliveries = summary.deliveries,
            "Sample data written"
        );
    }

    // 5. Attach logging observers.
    let changes = ChangeLog::attach(&coordinator);

    // 6. Start the simulator.
    if config.simulator.autostart {
        coordinator.start_simulator(config.simulator.minutes_per_tick)?;
    }

    // 7. Run until Ctrl-C or the real-time limit.
    wait_for_shutdown(config.simulator.max_real_time_seconds).await?;
    coordinator.stop_simulator_and_wait().await;

    log_summary(&coordinator, &changes)?;
    info!(now = %coordinator.now(), "dispatch-engine shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| EngineError::Logging {
            message: format!("invalid log level {:?}: {e}", logging.level),
        })?,
    };

    let installed = if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };
    installed.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

/// Wait for Ctrl-C, or for `limit_seconds` of wall time when non-zero.
async fn wait_for_shutdown(limit_seconds: u64) -> Result<(), EngineError> {
    if limit_seconds == 0 {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");
        return Ok(());
    }
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested");
        }
        () = tokio::time::sleep(Duration::from_secs(limit_seconds)) => {
            info!(limit_seconds, "Real-time limit reached");
        }
    }
    Ok(())
}

/// Log order counts by status and the observer notification totals.
fn log_summary(coordinator: &Coordinator, changes: &ChangeLog) -> Result<(), EngineError> {
    for (status, row) in coordinator.order_counts()? {
        let total: usize = row.values().sum();
        info!(status = ?status, total, by_schedule = ?row, "Orders by status");
    }
    let totals = changes.totals();
    info!(
        clock = totals.clock,
        orders = totals.orders,
        couriers = totals.couriers,
        config = totals.config,
        "Observer notifications"
    );
    Ok(())
}
