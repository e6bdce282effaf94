//! Injected metrics sink for resilience events
//!
//! Components take an explicitly constructed sink at construction time; there
//! is no process-wide registry. Production wiring exports these to the
//! platform's metrics pipeline, tests use [`RecordingMetrics`].

use std::fmt::Debug;

use parking_lot::Mutex;

use crate::circuit_breaker::CircuitState;

/// Outcome of a single retry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Success,
    Failure,
}

/// Sink for breaker and retry telemetry.
pub trait ResilienceMetrics: Send + Sync + Debug {
    /// A breaker entered a new state.
    fn record_breaker_transition(&self, name: &str, state: CircuitState);

    /// One attempt of a retried operation completed.
    fn record_retry_attempt(&self, operation: &str, outcome: RetryOutcome);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NoOpMetrics;

impl ResilienceMetrics for NoOpMetrics {
    fn record_breaker_transition(&self, _name: &str, _state: CircuitState) {}
    fn record_retry_attempt(&self, _operation: &str, _outcome: RetryOutcome) {}
}

/// Captures every event for assertion in tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    transitions: Mutex<Vec<(String, CircuitState)>>,
    attempts: Mutex<Vec<(String, RetryOutcome)>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<(String, CircuitState)> {
        self.transitions.lock().clone()
    }

    pub fn attempts(&self) -> Vec<(String, RetryOutcome)> {
        self.attempts.lock().clone()
    }
}

impl ResilienceMetrics for RecordingMetrics {
    fn record_breaker_transition(&self, name: &str, state: CircuitState) {
        self.transitions.lock().push((name.to_string(), state));
    }

    fn record_retry_attempt(&self, operation: &str, outcome: RetryOutcome) {
        self.attempts.lock().push((operation.to_string(), outcome));
    }
}
