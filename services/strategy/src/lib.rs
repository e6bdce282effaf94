//! Momentum strategy service
//!
//! Consumes market ticks from the bus, maintains per-symbol momentum and
//! VWAP/TWAP windows, and answers authenticated signal requests. Every
//! strategy invocation is gated by the capability check carried in the
//! message envelope; the bus connection and reply publication are protected
//! by the resilience layer.
//!
//! ```text
//! market.ticks ──────────────> [aggregators + price history]
//! strategy.signals.request ──> [auth check] ──> [momentum engine] ──> reply
//! ```

pub mod config;
pub mod envelope;
pub mod metrics;
pub mod momentum;
pub mod service;

pub use config::ServiceConfig;
pub use envelope::{AuthPayload, AuthenticatedMessage, SignalRequest, SignalResponse, TickPayload};
pub use metrics::{NoOpStrategyMetrics, RecordingStrategyMetrics, StrategyMetrics};
pub use momentum::{Bar, MomentumConfig, MomentumStrategy, Side, Signal};
pub use service::StrategyService;
