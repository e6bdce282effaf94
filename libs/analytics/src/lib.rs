//! Windowed price aggregation with exact calculations
//!
//! Maintains fixed-capacity sliding windows of trade/price observations per
//! instrument and derives volume-weighted (VWAP) and time-weighted (TWAP)
//! average prices from them. All arithmetic uses the Decimal type so results
//! round deterministically and no representation error accumulates across
//! thousands of incremental updates.
//!
//! Window maintenance is O(1) amortized: running cumulative sums are adjusted
//! when an observation is evicted rather than re-summing the window.

pub mod twap;
pub mod vwap;

pub use twap::TwapCalculator;
pub use vwap::{Trade, VwapCalculator};

/// All derived prices are quoted at 8 decimal places, rounded half-up.
pub const PRICE_SCALE: u32 = 8;
