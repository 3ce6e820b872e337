//! Indicator Engine
//!
//! Stateless indicator math over ordered price series. Everything here is
//! recomputed from scratch per window, so results only depend on the input.

pub mod ema;
pub mod rsi;

pub use ema::ema;
pub use rsi::rsi;

use crate::types::Bar;

/// RSI lookback used by both live scanning and backtests
pub const RSI_PERIOD: usize = 14;

/// Fast EMA period
pub const EMA_FAST_PERIOD: usize = 8;

/// Slow EMA period
pub const EMA_SLOW_PERIOD: usize = 21;

/// Extract close prices from a window of bars
pub fn closes<'a>(bars: impl IntoIterator<Item = &'a Bar>) -> Vec<f64> {
    bars.into_iter().map(|b| b.close).collect()
}

/// Indicator series aligned index-for-index with the window they were built from
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    pub rsi: Vec<f64>,
    pub ema_fast: Vec<f64>,
    pub ema_slow: Vec<f64>,
}

impl IndicatorSet {
    /// Compute RSI(14), EMA(8) and EMA(21) over the window
    pub fn compute(bars: &[Bar]) -> Self {
        Self::with_periods(bars, RSI_PERIOD, EMA_FAST_PERIOD, EMA_SLOW_PERIOD)
    }

    pub fn with_periods(bars: &[Bar], rsi_period: usize, fast: usize, slow: usize) -> Self {
        let closes = closes(bars);
        Self {
            rsi: rsi(&closes, rsi_period),
            ema_fast: ema(&closes, fast),
            ema_slow: ema(&closes, slow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_indicator_set_lengths_match_window() {
        let now = Utc::now();
        let bars: Vec<Bar> = (0..30)
            .map(|i| Bar::new("EURUSD", now, 1.0, 1.2, 0.9, 1.0 + i as f64 * 0.01, 10.0))
            .collect();

        let set = IndicatorSet::compute(&bars);
        assert_eq!(set.rsi.len(), 30);
        assert_eq!(set.ema_fast.len(), 30);
        assert_eq!(set.ema_slow.len(), 30);
        // Monotonic rise: no losses, RSI pinned at 100 once warmed up
        assert_eq!(set.rsi[RSI_PERIOD], 100.0);
        assert_eq!(set.rsi[RSI_PERIOD - 1], 0.0);
    }
}
