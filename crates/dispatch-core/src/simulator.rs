//! Autonomous clock driver.
//!
//! The simulator is a tokio task that advances the coordinator's clock by
//! a fixed number of virtual minutes on every wall-clock tick. It holds
//! only a [`Weak`] reference to the coordinator, so dropping the
//! coordinator ends the loop on the next tick.
//!
//! Cancellation is cooperative: the token is checked between ticks, and
//! an advance that has started always runs to completion.

use std::sync::Weak;
use std::time::Duration;

use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::error::DispatchError;

/// A running simulator task.
#[derive(Debug)]
pub(crate) struct SimulatorHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
    minutes_per_tick: u32,
}

impl SimulatorHandle {
    /// Whether the task is still looping.
    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished() && !self.token.is_cancelled()
    }

    /// Virtual minutes added per tick.
    pub(crate) const fn minutes_per_tick(&self) -> u32 {
        self.minutes_per_tick
    }

    /// Request the loop to stop after its current tick.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Request a stop and wait for the task to finish.
    pub(crate) async fn cancel_and_join(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            warn!(error = %err, "Simulator task ended abnormally");
        }
    }
}

/// Spawn the simulator loop on the current tokio runtime.
pub(crate) fn spawn(
    coordinator: Weak<Coordinator>,
    minutes_per_tick: u32,
    period: Duration,
) -> Result<SimulatorHandle, DispatchError> {
    if minutes_per_tick == 0 {
        return Err(DispatchError::invalid("minutes per tick must be positive"));
    }
    if period.is_zero() {
        return Err(DispatchError::invalid("tick interval must be positive"));
    }
    let runtime = tokio::runtime::Handle::try_current().map_err(|err| {
        DispatchError::unavailable(format!("simulator needs a tokio runtime: {err}"))
    })?;

    let token = CancellationToken::new();
    let step = TimeDelta::minutes(i64::from(minutes_per_tick));
    let task = runtime.spawn(run(coordinator, step, period, token.clone()));

    info!(
        minutes_per_tick,
        tick_interval_ms = period.as_millis(),
        "Simulator started"
    );
    Ok(SimulatorHandle {
        token,
        task,
        minutes_per_tick,
    })
}

async fn run(
    coordinator: Weak<Coordinator>,
    step: TimeDelta,
    period: Duration,
    token: CancellationToken,
) {
    let first = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut ticker = tokio::time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // --- Coordinator gone ---
        let Some(coordinator) = coordinator.upgrade() else {
            debug!("Coordinator dropped, simulator exiting");
            break;
        };

        // --- Advance ---
        match coordinator.advance_by(step) {
            Ok(report) => {
                ticks = ticks.saturating_add(1);
                if report.failures > 0 {
                    warn!(
                        failures = report.failures,
                        "Simulator tick finished with sweep failures"
                    );
                }
            }
            Err(err) => warn!(error = %err, "Simulator tick failed"),
        }
    }

    info!(ticks, "Simulator stopped");
}
