//! Virtual clock for the dispatch coordinator.
//!
//! The clock is the single source of truth for "now" in the business
//! domain. It is a plain value: the coordinator owns it inside its global
//! lock, so every read and write here is already serialized.
//!
//! # Design Principles
//!
//! - Time only moves forward. Setting an earlier time is rejected with
//!   [`ClockError::Backward`]; the activity sweep depends on it.
//! - Advancing to the current time is allowed and still counts as an
//!   advance (the sweep runs again against the same instant).
//! - All arithmetic is checked; overflowing the calendar is an error.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// The requested time is earlier than the current time.
    #[error("clock cannot move backward from {current} to {requested}")]
    Backward {
        /// Current virtual time.
        current: DateTime<Utc>,
        /// Rejected target time.
        requested: DateTime<Utc>,
    },

    /// The step would leave the representable calendar.
    #[error("clock overflow advancing {current} by {step}")]
    Overflow {
        /// Current virtual time.
        current: DateTime<Utc>,
        /// Requested step.
        step: TimeDelta,
    },
}

/// Fixed steps offered to manual clock controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockUnit {
    /// One minute.
    Minute,
    /// One hour.
    Hour,
    /// One day.
    Day,
    /// Thirty days.
    Month,
    /// Three hundred sixty-five days.
    Year,
}

impl ClockUnit {
    /// The step this unit advances the clock by.
    pub fn step(self) -> TimeDelta {
        match self {
            Self::Minute => TimeDelta::minutes(1),
            Self::Hour => TimeDelta::hours(1),
            Self::Day => TimeDelta::days(1),
            Self::Month => TimeDelta::days(30),
            Self::Year => TimeDelta::days(365),
        }
    }
}

/// The simulated current time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualClock {
    /// Current virtual time.
    now: DateTime<Utc>,
    /// Time the clock returns to on reset.
    start: DateTime<Utc>,
}

impl VirtualClock {
    /// Create a clock that starts (and resets) at `start`.
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self { now: start, start }
    }

    /// Create a clock starting at the current wall-clock minute.
    pub fn starting_now() -> Self {
        let wall = Utc::now();
        Self::new(wall.duration_trunc(TimeDelta::minutes(1)).unwrap_or(wall))
    }

    /// Current virtual time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Time the clock resets to.
    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Move the clock to `to` and return the previous time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Backward`] if `to` is earlier than now.
    pub fn set(&mut self, to: DateTime<Utc>) -> Result<DateTime<Utc>, ClockError> {
        if to < self.now {
            return Err(ClockError::Backward {
                current: self.now,
                requested: to,
            });
        }
        let previous = self.now;
        self.now = to;
        Ok(previous)
    }

    /// The time `step` after now, without moving the clock.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Backward`] for a negative step and
    /// [`ClockError::Overflow`] if the result is out of range.
    pub fn after(&self, step: TimeDelta) -> Result<DateTime<Utc>, ClockError> {
        let target = self
            .now
            .checked_add_signed(step)
            .ok_or(ClockError::Overflow {
                current: self.now,
                step,
            })?;
        if target < self.now {
            return Err(ClockError::Backward {
                current: self.now,
                requested: target,
            });
        }
        Ok(target)
    }

    /// Return the clock to its start time.
    pub const fn reset(&mut self) {
        self.now = self.start;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn clock_starts_at_start_time() {
        let clock = VirtualClock::new(start());
        assert_eq!(clock.now(), start());
        assert_eq!(clock.start(), start());
    }

    #[test]
    fn set_returns_previous_time() {
        let mut clock = VirtualClock::new(start());
        let later = start() + TimeDelta::hours(3);
        assert_eq!(clock.set(later).unwrap(), start());
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn set_to_same_time_is_allowed() {
        let mut clock = VirtualClock::new(start());
        assert!(clock.set(start()).is_ok());
    }

    #[test]
    fn backward_set_is_rejected_and_clock_unchanged() {
        let mut clock = VirtualClock::new(start());
        let earlier = start() - TimeDelta::seconds(1);
        assert!(matches!(
            clock.set(earlier),
            Err(ClockError::Backward { .. })
        ));
        assert_eq!(clock.now(), start());
    }

    #[test]
    fn after_rejects_negative_steps() {
        let clock = VirtualClock::new(start());
        assert_eq!(
            clock.after(ClockUnit::Day.step()).unwrap(),
            start() + TimeDelta::days(1)
        );
        assert!(clock.after(TimeDelta::minutes(-5)).is_err());
    }

    #[test]
    fn after_detects_overflow() {
        let clock = VirtualClock::new(DateTime::<Utc>::MAX_UTC);
        assert!(matches!(
            clock.after(TimeDelta::minutes(1)),
            Err(ClockError::Overflow { .. })
        ));
    }

    #[test]
    fn reset_returns_to_start() {
        let mut clock = VirtualClock::new(start());
        let _ = clock.set(start() + ClockUnit::Year.step()).unwrap();
        clock.reset();
        assert_eq!(clock.now(), start());
    }

    #[test]
    fn unit_steps() {
        assert_eq!(ClockUnit::Minute.step(), TimeDelta::minutes(1));
        assert_eq!(ClockUnit::Hour.step(), TimeDelta::minutes(60));
        assert_eq!(ClockUnit::Month.step(), TimeDelta::days(30));
    }
}
