//! Time-weighted average price over a bounded price window
//!
//! Simple arithmetic mean of the retained price observations; no volume
//! weighting. Same per-symbol windowing discipline as the VWAP side.

use std::collections::VecDeque;

use dashmap::DashMap;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::PRICE_SCALE;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PricePoint {
    price: Decimal,
    timestamp: i64,
}

#[derive(Debug)]
struct TwapWindow {
    prices: VecDeque<PricePoint>,
    running_total: Decimal,
}

impl TwapWindow {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            running_total: Decimal::ZERO,
        }
    }

    fn push(&mut self, point: PricePoint, capacity: usize) {
        if self.prices.len() == capacity {
            if let Some(evicted) = self.prices.pop_front() {
                self.running_total -= evicted.price;
            }
        }
        self.running_total += point.price;
        self.prices.push_back(point);
    }

    fn twap(&self) -> Option<Decimal> {
        if self.prices.is_empty() {
            return None;
        }
        Some(
            (self.running_total / Decimal::from(self.prices.len()))
                .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

/// Per-symbol TWAP calculator
#[derive(Debug)]
pub struct TwapCalculator {
    window_size: usize,
    windows: DashMap<String, TwapWindow>,
}

impl TwapCalculator {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            windows: DashMap::new(),
        }
    }

    /// Record a price observation for `symbol`.
    pub fn add_price(&self, symbol: &str, price: Decimal, timestamp: i64) {
        self.windows
            .entry(symbol.to_string())
            .or_insert_with(|| TwapWindow::with_capacity(self.window_size))
            .push(PricePoint { price, timestamp }, self.window_size);
    }

    /// Mean of the retained prices at 8 decimal places, half-up. `None` when
    /// no prices have been observed for `symbol`.
    pub fn twap(&self, symbol: &str) -> Option<Decimal> {
        self.windows.get(symbol).and_then(|w| w.twap())
    }

    /// Clear the window for `symbol` only.
    pub fn reset(&self, symbol: &str) {
        if self.windows.remove(symbol).is_some() {
            tracing::debug!(symbol, "twap window reset");
        }
    }
}
