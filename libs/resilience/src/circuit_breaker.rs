//! Circuit breaker state machine
//!
//! One named breaker per protected external call type, owned by a
//! [`CircuitBreakerManager`] and created lazily on first use. Counter and
//! state mutations are serialized by a dedicated mutex per breaker instance;
//! the guarded operation itself always runs outside that lock.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;

use crate::metrics::{NoOpMetrics, ResilienceMetrics};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests pass through, failures counted
    Closed,
    /// Dependency is failing, requests rejected immediately
    Open,
    /// Testing recovery, a bounded number of probes pass through
    HalfOpen,
}

impl CircuitState {
    pub fn is_closed(&self) -> bool {
        matches!(self, CircuitState::Closed)
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CircuitState::Open)
    }

    pub fn is_half_open(&self) -> bool {
        matches!(self, CircuitState::HalfOpen)
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: usize,
    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: usize,
    /// How long to stay open before allowing a recovery probe
    pub open_timeout: Duration,
    /// Maximum probe calls allowed while half-open
    pub max_half_open_probes: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_timeout: Duration::from_secs(30),
            max_half_open_probes: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Fast-recovery preset for low-latency call sites.
    pub fn fast_recovery() -> Self {
        Self {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout: Duration::from_secs(5),
            max_half_open_probes: 3,
        }
    }
}

/// Error returned by a breaker-guarded call.
///
/// The breaker never swallows the underlying error: a failed invocation
/// re-surfaces it unchanged as `Inner`.
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E>
where
    E: std::error::Error,
{
    #[error("circuit breaker '{name}' is open")]
    Open { name: String },

    #[error(transparent)]
    Inner(E),
}

impl<E: std::error::Error> CircuitBreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open { .. } => None,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: usize,
    /// Meaningful only while half-open
    success_count: usize,
    half_open_probes: usize,
    last_failure_time: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            half_open_probes: 0,
            last_failure_time: None,
        }
    }
}

/// Named circuit breaker guarding one external call type.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    metrics: Arc<dyn ResilienceMetrics>,
}

impl CircuitBreaker {
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        metrics: Arc<dyn ResilienceMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state, evaluating the lazy Open -> HalfOpen transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.check_recovery(&mut inner);
        inner.state
    }

    /// Run `op` under breaker protection.
    ///
    /// Rejects immediately with `Open` when the circuit is open or the
    /// half-open probe budget is exhausted; otherwise invokes `op` outside
    /// the state lock and records its outcome.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error,
    {
        if !self.try_acquire() {
            tracing::warn!(breaker = %self.name, "circuit breaker rejected call");
            return Err(CircuitBreakerError::Open {
                name: self.name.clone(),
            });
        }

        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    /// Force a specific state (test hook).
    pub fn force_state(&self, state: CircuitState) {
        let mut inner = self.inner.lock();
        if state.is_open() {
            inner.last_failure_time = Some(Instant::now());
        }
        self.transition(&mut inner, state);
    }

    fn check_recovery(&self, inner: &mut BreakerInner) {
        if inner.state.is_open() {
            if let Some(last_failure) = inner.last_failure_time {
                if last_failure.elapsed() >= self.config.open_timeout {
                    self.transition(inner, CircuitState::HalfOpen);
                }
            }
        }
    }

    /// Resolve state and, if the call may proceed, reserve a probe slot
    /// where applicable.
    fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        self.check_recovery(&mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => {
                if inner.half_open_probes >= self.config.max_half_open_probes {
                    false
                } else {
                    inner.half_open_probes += 1;
                    true
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                // Full reset, not a decrement
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure_time = Some(Instant::now());

        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    tracing::warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        "circuit breaker opened"
                    );
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                tracing::warn!(breaker = %self.name, "circuit breaker reopened");
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, new_state: CircuitState) {
        if inner.state == new_state {
            return;
        }
        tracing::info!(
            breaker = %self.name,
            from = ?inner.state,
            to = ?new_state,
            "circuit breaker state transition"
        );
        inner.state = new_state;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.half_open_probes = 0;
        self.metrics.record_breaker_transition(&self.name, new_state);
    }
}

/// Owns one breaker per protected call type, keyed by name.
#[derive(Debug)]
pub struct CircuitBreakerManager {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    metrics: Arc<dyn ResilienceMetrics>,
}

impl CircuitBreakerManager {
    pub fn new(metrics: Arc<dyn ResilienceMetrics>) -> Self {
        Self {
            breakers: DashMap::new(),
            metrics,
        }
    }

    pub fn get_or_create(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(name, config, self.metrics.clone()))
            })
            .clone()
    }

    /// Snapshot of every breaker's current state.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}

impl Default for CircuitBreakerManager {
    fn default() -> Self {
        Self::new(Arc::new(NoOpMetrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RecordingMetrics;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for TestError {}

    fn test_breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new("test", config, Arc::new(NoOpMetrics))
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<TestError>> {
        breaker
            .execute(|| async { Err::<(), _>(TestError("downstream failed")) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), CircuitBreakerError<TestError>> {
        breaker.execute(|| async { Ok::<_, TestError>(()) }).await
    }

    #[tokio::test]
    async fn closed_passes_through_and_counts_failures() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        assert!(fail(&breaker).await.is_err());
        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_closed());

        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_open());
    }

    #[tokio::test]
    async fn success_fully_resets_failure_count() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        assert!(fail(&breaker).await.is_err());
        assert!(succeed(&breaker).await.is_ok());
        // Reset means one more failure is not enough to open
        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_closed());
    }

    #[tokio::test]
    async fn open_rejects_without_invoking_operation() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_secs(60),
            ..Default::default()
        });

        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_open());

        let invocations = AtomicUsize::new(0);
        let result: Result<(), _> = breaker
            .execute(|| {
                invocations.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TestError>(()) }
            })
            .await;

        assert!(result.unwrap_err().is_open());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn open_transitions_to_half_open_after_timeout() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            open_timeout: Duration::from_millis(10),
            ..Default::default()
        });

        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_open());

        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(breaker.state().is_half_open());
    }

    #[tokio::test]
    async fn half_open_closes_after_success_threshold() {
        let metrics = Arc::new(RecordingMetrics::new());
        let breaker = CircuitBreaker::new(
            "recovering",
            CircuitBreakerConfig {
                failure_threshold: 1,
                success_threshold: 2,
                open_timeout: Duration::from_millis(5),
                max_half_open_probes: 5,
            },
            metrics.clone(),
        );

        assert!(fail(&breaker).await.is_err());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(succeed(&breaker).await.is_ok());
        assert!(breaker.state().is_half_open());
        assert!(succeed(&breaker).await.is_ok());
        assert!(breaker.state().is_closed());

        let states: Vec<_> = metrics
            .transitions()
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        assert_eq!(
            states,
            vec![
                CircuitState::Open,
                CircuitState::HalfOpen,
                CircuitState::Closed
            ]
        );
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 3,
            open_timeout: Duration::from_millis(5),
            ..Default::default()
        });

        assert!(fail(&breaker).await.is_err());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(breaker.state().is_half_open());

        assert!(fail(&breaker).await.is_err());
        assert!(breaker.state().is_open());
    }

    #[tokio::test]
    async fn half_open_probe_budget_is_enforced() {
        let breaker = test_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 10,
            open_timeout: Duration::from_millis(1),
            max_half_open_probes: 2,
        });

        assert!(fail(&breaker).await.is_err());
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(succeed(&breaker).await.is_ok());
        assert!(succeed(&breaker).await.is_ok());

        // Probe budget exhausted while still half-open
        let result = succeed(&breaker).await;
        assert!(result.unwrap_err().is_open());
    }

    #[tokio::test]
    async fn inner_error_is_resurfaced_unchanged() {
        let breaker = test_breaker(CircuitBreakerConfig::default());
        let err = fail(&breaker).await.unwrap_err();
        match err {
            CircuitBreakerError::Inner(e) => assert_eq!(e.to_string(), "downstream failed"),
            CircuitBreakerError::Open { .. } => panic!("expected inner error"),
        }
    }

    #[tokio::test]
    async fn manager_returns_same_breaker_per_name() {
        let manager = CircuitBreakerManager::default();
        let a = manager.get_or_create("nats_publish", CircuitBreakerConfig::default());
        let b = manager.get_or_create("nats_publish", CircuitBreakerConfig::default());
        assert!(Arc::ptr_eq(&a, &b));

        a.force_state(CircuitState::Open);
        let states = manager.states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].0, "nats_publish");
        assert!(states[0].1.is_open());
    }
}
