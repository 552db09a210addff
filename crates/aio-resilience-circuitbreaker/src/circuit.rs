use std::time::Instant;

use aio_resilience_core::RollingMetrics;

use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;

/// State of a single scope's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// All mutable state for one scope, guarded by a single per-scope mutex so
/// the admission check and the half-open probe flag flip atomically with
/// respect to concurrent callers.
pub(crate) struct Circuit {
    state: CircuitState,
    blocked_until: Instant,
    probe_in_flight: bool,
    metrics: RollingMetrics,
}

impl Circuit {
    pub(crate) fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            state: CircuitState::Closed,
            blocked_until: Instant::now(),
            probe_in_flight: false,
            metrics: RollingMetrics::new(config.sampling_duration, config.windows_count),
        }
    }

    /// Current state, read under the same per-scope lock every other
    /// mutation goes through — there is no lock-free fast path.
    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    pub(crate) fn try_acquire(&mut self, config: &CircuitBreakerConfig) -> bool {
        match self.state {
            CircuitState::Closed => {
                self.emit_permitted(config);
                true
            }
            CircuitState::Open => {
                if Instant::now() < self.blocked_until {
                    self.emit_rejected(config);
                    false
                } else {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.probe_in_flight = true;
                    self.emit_permitted(config);
                    true
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    self.emit_rejected(config);
                    false
                } else {
                    self.probe_in_flight = true;
                    self.emit_permitted(config);
                    true
                }
            }
        }
    }

    pub(crate) fn record_success(&mut self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::SuccessRecorded {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });

        match self.state {
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.transition_to(CircuitState::Closed, config);
                self.metrics.reset();
            }
            _ => {
                self.metrics.record_success();
            }
        }
    }

    pub(crate) fn record_failure(&mut self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::FailureRecorded {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });

        match self.state {
            CircuitState::HalfOpen => {
                self.probe_in_flight = false;
                self.open(config);
            }
            _ => {
                self.metrics.record_failure();
                self.evaluate_window(config);
            }
        }
    }

    fn evaluate_window(&mut self, config: &CircuitBreakerConfig) {
        let snapshot = self.metrics.snapshot();
        if snapshot.total() < config.minimum_throughput as u64 {
            return;
        }
        if snapshot.failure_rate() >= config.failure_threshold {
            self.open(config);
        }
    }

    fn open(&mut self, config: &CircuitBreakerConfig) {
        self.blocked_until = Instant::now() + config.break_duration;
        self.transition_to(CircuitState::Open, config);
    }

    fn transition_to(&mut self, state: CircuitState, config: &CircuitBreakerConfig) {
        if self.state == state {
            return;
        }
        let from_state = self.state;

        config.event_listeners.emit(&CircuitBreakerEvent::StateTransition {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            from_state,
            to_state: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(circuit = %config.name, from = ?from_state, to = ?state, "circuit breaker state transition");

        #[cfg(feature = "metrics")]
        {
            metrics::counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone()
            )
            .increment(1);
        }

        self.state = state;
    }

    fn emit_permitted(&self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::CallPermitted {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "permitted").increment(1);
    }

    fn emit_rejected(&self, config: &CircuitBreakerConfig) {
        config.event_listeners.emit(&CircuitBreakerEvent::CallRejected {
            pattern_name: config.name.clone(),
            timestamp: Instant::now(),
        });

        #[cfg(feature = "metrics")]
        metrics::counter!("circuitbreaker_calls_total", "circuitbreaker" => config.name.clone(), "outcome" => "rejected").increment(1);
    }
}
