//! Volume-weighted average price over a bounded trade window
//!
//! Each symbol owns a fixed-capacity window of trades plus running cumulative
//! volume and value. The invariant maintained by every update: the cumulative
//! sums equal the sums over exactly the trades currently retained, so the
//! oldest trade's contribution is subtracted before a new trade displaces it.

use std::collections::VecDeque;

use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::PRICE_SCALE;

/// A single trade observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
}

#[derive(Debug)]
struct VwapWindow {
    trades: VecDeque<Trade>,
    cumulative_volume: Decimal,
    cumulative_value: Decimal,
}

impl VwapWindow {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            trades: VecDeque::with_capacity(capacity),
            cumulative_volume: Decimal::ZERO,
            cumulative_value: Decimal::ZERO,
        }
    }

    fn push(&mut self, trade: Trade, capacity: usize) {
        if self.trades.len() == capacity {
            if let Some(evicted) = self.trades.pop_front() {
                self.cumulative_volume -= evicted.quantity;
                self.cumulative_value -= evicted.price * evicted.quantity;
            }
        }

        self.cumulative_volume += trade.quantity;
        self.cumulative_value += trade.price * trade.quantity;
        self.trades.push_back(trade);
    }

    fn vwap(&self) -> Option<Decimal> {
        if self.cumulative_volume.is_zero() {
            return None;
        }
        Some(
            (self.cumulative_value / self.cumulative_volume)
                .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

/// Per-symbol VWAP calculator
///
/// Safe for concurrent use: updates for the same symbol are serialized by the
/// map's per-entry locking, updates for different symbols never contend.
#[derive(Debug)]
pub struct VwapCalculator {
    window_size: usize,
    windows: DashMap<String, VwapWindow>,
}

impl VwapCalculator {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            windows: DashMap::new(),
        }
    }

    /// Record a trade for `symbol`, evicting the oldest retained trade if the
    /// window is already at capacity.
    pub fn add_trade(&self, symbol: &str, price: Decimal, quantity: Decimal, timestamp: i64) {
        let trade = Trade {
            price,
            quantity,
            timestamp,
        };
        self.windows
            .entry(symbol.to_string())
            .or_insert_with(|| VwapWindow::with_capacity(self.window_size))
            .push(trade, self.window_size);
    }

    /// Current VWAP for `symbol` at 8 decimal places, half-up.
    ///
    /// Returns `None` until at least one trade with nonzero quantity has been
    /// observed.
    pub fn vwap(&self, symbol: &str) -> Option<Decimal> {
        self.windows.get(symbol).and_then(|w| w.vwap())
    }

    /// Clear the window and cumulative sums for `symbol` only.
    pub fn reset(&self, symbol: &str) {
        if self.windows.remove(symbol).is_some() {
            tracing::debug!(symbol, "vwap window reset");
        }
    }
}
