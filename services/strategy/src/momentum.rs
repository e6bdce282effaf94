//! Momentum strategy engine
//!
//! Tracks a bounded close-price history per symbol and turns the fractional
//! change across that window into directional signals. Signal generation is a
//! pure function of current history plus the supplied position; it keeps no
//! memory of past signals.

use std::collections::VecDeque;

use auth::{permissions, AuthContext, AuthError};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

/// Directional trading signal, produced once per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub side: Side,
    /// Confidence in [0, 1].
    pub strength: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct MomentumConfig {
    /// Price history length per symbol.
    pub lookback_period: usize,
    /// Fractional change required to enter a position while flat.
    pub entry_threshold: f64,
    /// Fractional change at which an open long is exited (negated for
    /// shorts). Typically negative.
    pub exit_threshold: f64,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            lookback_period: 20,
            entry_threshold: 0.02,
            exit_threshold: -0.01,
        }
    }
}

/// Momentum over a fixed lookback window.
#[derive(Debug)]
pub struct MomentumStrategy {
    config: MomentumConfig,
    history: DashMap<String, VecDeque<Decimal>>,
}

impl MomentumStrategy {
    pub fn new(config: MomentumConfig) -> Self {
        Self {
            config,
            history: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MomentumConfig {
        &self.config
    }

    /// Append the bar's close to the symbol's history, evicting the oldest
    /// entry silently once the lookback window is full.
    pub fn update_bar(&self, bar: &Bar) {
        let mut history = self
            .history
            .entry(bar.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.config.lookback_period));

        if history.len() == self.config.lookback_period {
            history.pop_front();
        }
        history.push_back(bar.close);
    }

    /// Fractional change between the oldest and newest retained price.
    ///
    /// `None` until a full lookback window exists, or when the oldest price
    /// is exactly zero.
    pub fn momentum(&self, symbol: &str) -> Option<f64> {
        let history = self.history.get(symbol)?;
        if history.len() < self.config.lookback_period {
            return None;
        }

        let oldest = *history.front()?;
        let newest = *history.back()?;
        if oldest.is_zero() {
            return None;
        }

        ((newest - oldest) / oldest).to_f64()
    }

    /// Generate a signal for `symbol` given the caller's current signed
    /// position.
    ///
    /// Requires the `strategies:execute` capability; the check runs before
    /// any momentum computation.
    pub fn generate_signal(
        &self,
        auth: &AuthContext,
        symbol: &str,
        current_position: Decimal,
    ) -> Result<Option<Signal>, AuthError> {
        auth.require_any(&[permissions::STRATEGIES_EXECUTE])?;

        let momentum = match self.momentum(symbol) {
            Some(m) => m,
            None => return Ok(None),
        };

        let signal = if current_position.is_zero() {
            self.entry_signal(symbol, momentum)
        } else if current_position > Decimal::ZERO {
            self.exit_long_signal(symbol, momentum)
        } else {
            self.exit_short_signal(symbol, momentum)
        };

        Ok(signal)
    }

    fn entry_signal(&self, symbol: &str, momentum: f64) -> Option<Signal> {
        let threshold = self.config.entry_threshold;
        if momentum >= threshold {
            Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Buy,
                strength: (momentum / threshold).min(1.0),
                reason: format!("Positive momentum: {:.2}%", momentum * 100.0),
            })
        } else if momentum <= -threshold {
            Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Sell,
                strength: (momentum.abs() / threshold).min(1.0),
                reason: format!("Negative momentum: {:.2}%", momentum * 100.0),
            })
        } else {
            None
        }
    }

    fn exit_long_signal(&self, symbol: &str, momentum: f64) -> Option<Signal> {
        if momentum <= self.config.exit_threshold {
            Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Sell,
                strength: 1.0,
                reason: format!("Exit long, momentum reversal: {:.2}%", momentum * 100.0),
            })
        } else {
            None
        }
    }

    fn exit_short_signal(&self, symbol: &str, momentum: f64) -> Option<Signal> {
        if momentum >= -self.config.exit_threshold {
            Some(Signal {
                symbol: symbol.to_string(),
                side: Side::Buy,
                strength: 1.0,
                reason: format!("Exit short, momentum reversal: {:.2}%", momentum * 100.0),
            })
        } else {
            None
        }
    }

    /// Operational snapshot of the engine's configuration and per-symbol
    /// history depth.
    pub fn state_snapshot(&self) -> StrategySnapshot {
        StrategySnapshot {
            lookback_period: self.config.lookback_period,
            entry_threshold: self.config.entry_threshold,
            exit_threshold: self.config.exit_threshold,
            history_lengths: self
                .history
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().len()))
                .collect(),
        }
    }
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self::new(MomentumConfig::default())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategySnapshot {
    pub lookback_period: usize,
    pub entry_threshold: f64,
    pub exit_threshold: f64,
    pub history_lengths: std::collections::HashMap<String, usize>,
}
