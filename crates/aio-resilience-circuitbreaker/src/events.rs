use std::time::Instant;

use aio_resilience_core::ResilienceEvent;

use crate::circuit::CircuitState;

/// Events emitted by a [`crate::CircuitBreaker`] as calls are permitted,
/// rejected, or change its state.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    CallPermitted { pattern_name: String, timestamp: Instant, state: CircuitState },
    CallRejected { pattern_name: String, timestamp: Instant },
    SuccessRecorded { pattern_name: String, timestamp: Instant, state: CircuitState },
    FailureRecorded { pattern_name: String, timestamp: Instant, state: CircuitState },
    StateTransition { pattern_name: String, timestamp: Instant, from_state: CircuitState, to_state: CircuitState },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::FailureRecorded { pattern_name, .. }
            | CircuitBreakerEvent::StateTransition { pattern_name, .. } => pattern_name,
        }
    }
}
