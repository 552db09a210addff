//! Inter-attempt delay policies.

use std::time::Duration;

use rand::Rng;

pub trait DelayProvider: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

/// Always returns the same delay.
pub struct ConstantDelay {
    delay: Duration,
}

impl ConstantDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for ConstantDelay {
    fn default() -> Self {
        Self { delay: Duration::ZERO }
    }
}

impl DelayProvider for ConstantDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Grows linearly with the attempt number, perturbed by uniform jitter.
pub struct LinearDelay {
    min_delay: Duration,
    multiplier: Duration,
    jitter: f64,
}

impl LinearDelay {
    pub fn new(min_delay: Duration, multiplier: Duration, jitter: f64) -> Self {
        Self { min_delay, multiplier, jitter }
    }
}

impl Default for LinearDelay {
    fn default() -> Self {
        Self {
            min_delay: Duration::ZERO,
            multiplier: Duration::from_millis(50),
            jitter: 0.2,
        }
    }
}

impl DelayProvider for LinearDelay {
    fn delay(&self, attempt: u32) -> Duration {
        let base = self.min_delay.as_secs_f64() + attempt as f64 * self.multiplier.as_secs_f64();
        let mut rng = rand::rng();
        let mut jitter_amount = base * rng.random::<f64>() * self.jitter;
        if rng.random::<f64>() < 0.5 {
            jitter_amount = -jitter_amount;
        }
        Duration::from_secs_f64((base + jitter_amount).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_delay_ignores_attempt() {
        let d = ConstantDelay::new(Duration::from_millis(100));
        assert_eq!(d.delay(0), d.delay(5));
    }

    #[test]
    fn linear_delay_grows_with_attempt_on_average() {
        let d = LinearDelay::new(Duration::ZERO, Duration::from_millis(100), 0.0);
        assert!(d.delay(5) > d.delay(1));
    }

    #[test]
    fn linear_delay_never_goes_negative() {
        let d = LinearDelay::new(Duration::ZERO, Duration::from_millis(10), 1.0);
        for attempt in 0..20 {
            assert!(d.delay(attempt) >= Duration::ZERO);
        }
    }
}
