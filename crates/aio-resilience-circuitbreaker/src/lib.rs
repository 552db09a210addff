//! A generic, per-scope circuit breaker.
//!
//! Unlike a breaker wired to one endpoint, [`CircuitBreaker`] partitions its
//! state by an arbitrary `Scope` key (an endpoint URL, a peer id, anything
//! `Hash + Eq + Clone`), lazily creating a fresh closed circuit the first
//! time a scope is seen. Each scope's state machine — closed, open,
//! half-open — and its rolling failure metrics are guarded by one mutex, so
//! the half-open single-probe guarantee holds under concurrent callers.

mod circuit;
mod config;
mod error;
mod events;

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;

pub use circuit::CircuitState;
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerConfigError;
pub use events::CircuitBreakerEvent;

use circuit::Circuit;

/// A per-scope circuit breaker.
///
/// `Scope` is typically the target endpoint; it must be `Hash + Eq + Clone`
/// since it both identifies and lazily creates a circuit.
pub struct CircuitBreaker<Scope> {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<Scope, Arc<Mutex<Circuit>>>>,
}

impl<Scope> CircuitBreaker<Scope>
where
    Scope: Hash + Eq + Clone + Send + Sync,
{
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, circuits: Mutex::new(HashMap::new()) }
    }

    async fn circuit_for(&self, scope: &Scope) -> Arc<Mutex<Circuit>> {
        let mut circuits = self.circuits.lock().await;
        circuits
            .entry(scope.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Circuit::new(&self.config))))
            .clone()
    }

    /// Returns the current state of `scope`'s circuit without creating it if
    /// it doesn't exist yet.
    pub async fn state_of(&self, scope: &Scope) -> Option<CircuitState> {
        let circuits = self.circuits.lock().await;
        let entry = circuits.get(scope)?;
        let circuit = entry.lock().await;
        Some(circuit.state())
    }

    /// Runs `op` under this breaker's admission control for `scope`.
    ///
    /// If the circuit is open (or a half-open probe is already in flight),
    /// `op` is never called and `fallback` is returned instead. Otherwise
    /// `op` runs, and `is_successful` classifies its output to update the
    /// circuit's rolling metrics and, where the failure threshold is
    /// crossed, its state.
    ///
    /// A cancelled `op` (its future dropped before completing) is recorded
    /// as neither a success nor a failure: the breaker never observed a
    /// classifiable outcome for it.
    pub async fn execute<F, Fut, T>(&self, scope: Scope, op: F, fallback: T, is_successful: impl Fn(&T) -> bool) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let circuit = self.circuit_for(&scope).await;

        let permitted = {
            let mut guard = circuit.lock().await;
            guard.try_acquire(&self.config)
        };

        if !permitted {
            return fallback;
        }

        let result = op().await;

        let mut guard = circuit.lock().await;
        if is_successful(&result) {
            guard.record_success(&self.config);
        } else {
            guard.record_failure(&self.config);
        }

        result
    }
}
