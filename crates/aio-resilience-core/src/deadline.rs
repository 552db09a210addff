//! Absolute deadlines shared across a call chain.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CoreError;

const FLOOR: Duration = Duration::from_millis(1);

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn initial_timestamp() -> f64 {
    now_secs() - 86_400.0
}

/// An absolute point in time that a call chain must complete by.
///
/// Deadlines are value types: cheap to copy, compared by absolute time, and
/// freely shared between concurrent attempts spawned from the same call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadline {
    deadline_at: f64,
}

impl Deadline {
    /// Builds a deadline `timeout` from now.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self {
            deadline_at: now_secs() + timeout.as_secs_f64(),
        }
    }

    /// Builds a deadline from an absolute Unix timestamp, in seconds.
    ///
    /// Rejects timestamps further in the past than yesterday, which almost
    /// always indicates a unit mix-up (e.g. milliseconds passed where seconds
    /// were expected) rather than a legitimately expired deadline.
    pub fn from_epoch_seconds(deadline_at: f64) -> Result<Self, CoreError> {
        let floor = initial_timestamp();
        if deadline_at < floor {
            return Err(CoreError::InvalidDeadline { deadline_at, floor });
        }
        Ok(Self { deadline_at })
    }

    /// Parses a deadline from its serialized decimal-seconds form.
    pub fn try_parse(value: &str) -> Option<Self> {
        value.trim().parse::<f64>().ok().and_then(|secs| Self::from_epoch_seconds(secs).ok())
    }

    fn signed_remaining_secs(&self) -> f64 {
        self.deadline_at - now_secs()
    }

    /// The remaining time budget, floored at 1ms so callers can always use it
    /// as a sleep/timeout duration without special-casing "already expired".
    pub fn remaining(&self) -> Duration {
        let remaining = self.signed_remaining_secs();
        if remaining <= FLOOR.as_secs_f64() {
            FLOOR
        } else {
            Duration::from_secs_f64(remaining)
        }
    }

    /// True once the unfloored remaining time has reached zero or less.
    pub fn expired(&self) -> bool {
        self.signed_remaining_secs() <= 0.0
    }

    /// Splits the deadline's remaining time by `factor`, returning a new
    /// deadline with that fraction of the remaining budget.
    pub fn split(&self, factor: f64) -> Deadline {
        Deadline {
            deadline_at: now_secs() + self.signed_remaining_secs() / factor,
        }
    }

    /// The absolute Unix timestamp this deadline falls at, in seconds.
    pub fn as_epoch_seconds(&self) -> f64 {
        self.deadline_at
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.deadline_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_floors_at_one_millisecond() {
        let d = Deadline::from_epoch_seconds(now_secs() - 10.0).unwrap();
        assert!(d.expired());
        assert_eq!(d.remaining(), FLOOR);
    }

    #[test]
    fn not_expired_before_deadline() {
        let d = Deadline::from_timeout(Duration::from_secs(5));
        assert!(!d.expired());
        assert!(d.remaining() > Duration::from_secs(1));
    }

    #[test]
    fn rejects_implausible_absolute_timestamp() {
        let err = Deadline::from_epoch_seconds(0.0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidDeadline { .. }));
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let d = Deadline::from_timeout(Duration::from_secs(30));
        let parsed = Deadline::try_parse(&d.to_string()).unwrap();
        assert!((parsed.as_epoch_seconds() - d.as_epoch_seconds()).abs() < 1e-6);
    }

    #[test]
    fn split_divides_remaining_budget() {
        let d = Deadline::from_timeout(Duration::from_secs(9));
        let split = d.split(3.0);
        let ratio = split.remaining().as_secs_f64() / d.remaining().as_secs_f64();
        assert!((ratio - 1.0 / 3.0).abs() < 0.05);
    }
}
