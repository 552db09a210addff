//! Redistributing the outer deadline across a sequence of attempts.

use crate::deadline::Deadline;
use crate::error::CoreError;

pub trait DeadlineProvider: Send + Sync {
    fn deadline(&self, deadline: &Deadline, attempt: u32, attempts_count: u32) -> Deadline;
}

/// Returns the outer deadline unchanged for every attempt.
#[derive(Default)]
pub struct PassThroughDeadline;

impl DeadlineProvider for PassThroughDeadline {
    fn deadline(&self, deadline: &Deadline, _attempt: u32, _attempts_count: u32) -> Deadline {
        *deadline
    }
}

/// Splits the remaining deadline across the remaining attempts.
///
/// With `attempts_count_to_split` unset, each attempt gets roughly an equal
/// share of whatever remains: if earlier attempts finish quickly, later ones
/// inherit a larger share because the split factor shrinks as `attempt` grows
/// while `remaining` barely has.
pub struct SplitBetweenAttempts {
    split_factor: Option<u32>,
}

impl SplitBetweenAttempts {
    pub fn new(split_factor: Option<u32>) -> Result<Self, CoreError> {
        if let Some(factor) = split_factor {
            if factor < 2 {
                return Err(CoreError::InvalidSplitFactor(factor));
            }
        }
        Ok(Self { split_factor })
    }
}

impl DeadlineProvider for SplitBetweenAttempts {
    fn deadline(&self, deadline: &Deadline, attempt: u32, attempts_count: u32) -> Deadline {
        if deadline.expired() {
            return *deadline;
        }

        let effective_split_factor = match self.split_factor {
            None => attempts_count as i64 - attempt as i64,
            Some(factor) => factor.min(attempts_count) as i64 - attempt as i64,
        };

        if effective_split_factor <= 1 {
            return *deadline;
        }

        deadline.split(effective_split_factor as f64)
    }
}
