//! Resilience layer: circuit breaker and retry with exponential backoff
//!
//! Protects calls to unreliable external operations from cascading failure.
//! The circuit breaker converts repeated failures into fast-fail rejections
//! instead of repeatedly incurring a degraded dependency's full timeout; the
//! retry executor absorbs transient failures with bounded backoff. The two
//! are independent and composable: wrap a breaker-guarded call in retry, or
//! vice versa, per call site.
//!
//! ## Circuit breaker states
//!
//! ```text
//! CLOSED ──failure_threshold──> OPEN ──open_timeout──> HALF_OPEN
//!   │                            │                        │
//!   └──────────────── success ───┴──── failure ──────────┘
//! ```
//!
//! All breaker/retry state is process-local; deployments with multiple
//! service instances run independent breakers per instance.

pub mod circuit_breaker;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerManager, CircuitState,
};
pub use metrics::{NoOpMetrics, RecordingMetrics, ResilienceMetrics, RetryOutcome};
pub use retry::{with_retry, RetryPolicy};
