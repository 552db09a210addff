use std::time::Duration;

use aio_resilience_core::EventListeners;

use crate::error::CircuitBreakerConfigError;
use crate::events::CircuitBreakerEvent;

/// Configuration for a [`crate::CircuitBreaker`].
pub struct CircuitBreakerConfig {
    pub(crate) break_duration: Duration,
    pub(crate) sampling_duration: Duration,
    pub(crate) windows_count: u32,
    pub(crate) minimum_throughput: u32,
    pub(crate) failure_threshold: f64,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Fluent builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    break_duration: Duration,
    sampling_duration: Duration,
    windows_count: u32,
    minimum_throughput: u32,
    failure_threshold: f64,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self {
            break_duration: Duration::from_secs(30),
            sampling_duration: Duration::from_secs(10),
            windows_count: 10,
            minimum_throughput: 5,
            failure_threshold: 0.5,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// How long the circuit stays open before admitting a probe.
    ///
    /// Default: 30 seconds
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.break_duration = duration;
        self
    }

    /// The trailing window over which failure rate is evaluated.
    ///
    /// Default: 10 seconds
    pub fn sampling_duration(mut self, duration: Duration) -> Self {
        self.sampling_duration = duration;
        self
    }

    /// Number of sub-buckets the sampling window is divided into.
    ///
    /// Default: 10
    pub fn windows_count(mut self, count: u32) -> Self {
        self.windows_count = count;
        self
    }

    /// Minimum number of recorded calls before the failure rate is evaluated.
    ///
    /// Default: 5
    pub fn minimum_throughput(mut self, count: u32) -> Self {
        self.minimum_throughput = count;
        self
    }

    /// Failure rate (0.0-1.0) at which the circuit opens.
    ///
    /// Default: 0.5
    pub fn failure_threshold(mut self, rate: f64) -> Self {
        self.failure_threshold = rate;
        self
    }

    /// Human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for state-transition events.
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(crate::circuit::CircuitState, crate::circuit::CircuitState) + Send + Sync + 'static,
    {
        use aio_resilience_core::FnListener;
        self.event_listeners.add(FnListener::new(move |event: &CircuitBreakerEvent| {
            if let CircuitBreakerEvent::StateTransition { from_state, to_state, .. } = event {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    pub fn build(self) -> Result<CircuitBreakerConfig, CircuitBreakerConfigError> {
        if !(0.0..=1.0).contains(&self.failure_threshold) || self.failure_threshold <= 0.0 {
            return Err(CircuitBreakerConfigError::InvalidFailureRateThreshold(self.failure_threshold));
        }
        if self.windows_count < 1 {
            return Err(CircuitBreakerConfigError::InvalidWindowsCount(self.windows_count));
        }
        if self.minimum_throughput < 1 {
            return Err(CircuitBreakerConfigError::InvalidMinimumThroughput(self.minimum_throughput));
        }

        Ok(CircuitBreakerConfig {
            break_duration: self.break_duration,
            sampling_duration: self.sampling_duration,
            windows_count: self.windows_count,
            minimum_throughput: self.minimum_throughput,
            failure_threshold: self.failure_threshold,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
