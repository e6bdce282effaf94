//! Injected metrics sink for strategy events

use std::fmt::Debug;

use parking_lot::Mutex;

use crate::momentum::Side;

/// Sink for signal telemetry, passed to the service at construction.
pub trait StrategyMetrics: Send + Sync + Debug {
    fn record_signal(&self, strategy: &str, symbol: &str, side: Side);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NoOpStrategyMetrics;

impl StrategyMetrics for NoOpStrategyMetrics {
    fn record_signal(&self, _strategy: &str, _symbol: &str, _side: Side) {}
}

/// Captures every event for assertion in tests.
#[derive(Debug, Default)]
pub struct RecordingStrategyMetrics {
    signals: Mutex<Vec<(String, String, Side)>>,
}

impl RecordingStrategyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<(String, String, Side)> {
        self.signals.lock().clone()
    }
}

impl StrategyMetrics for RecordingStrategyMetrics {
    fn record_signal(&self, strategy: &str, symbol: &str, side: Side) {
        self.signals
            .lock()
            .push((strategy.to_string(), symbol.to_string(), side));
    }
}
