//! RSI divergence confirmed by a reversal candle
//!
//! Price makes a new extreme over the last 20 bars while RSI fails to
//! confirm it. A signal only fires when one of the last 3 bars also prints a
//! reversal candle in the divergence direction.

use std::time::Duration;

use tracing::debug;

use super::candlestick::reversal_direction;
use super::{PatternScanner, ScanInput};
use crate::types::{Direction, Signal};

const CONFIDENCE: f64 = 0.8;
const TTL: Duration = Duration::from_secs(120);

/// Bars examined for swing structure
const LOOKBACK: usize = 20;

/// Most recent bars excluded from the swing search and checked for a reversal
const CONFIRM_BARS: usize = 3;

#[derive(Debug, Default, Clone, Copy)]
pub struct RsiDivergenceScanner;

impl PatternScanner for RsiDivergenceScanner {
    fn name(&self) -> &'static str {
        "rsi_divergence"
    }

    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal> {
        let n = input.candles.len();
        if n < LOOKBACK || input.rsi.len() != n {
            return Vec::new();
        }

        let c = &input.candles[n - LOOKBACK..];
        let r = &input.rsi[n - LOOKBACK..];
        let swing_end = c.len() - CONFIRM_BARS;

        let mut high_idx = 0;
        let mut low_idx = 0;
        let mut high_found = false;
        let mut low_found = false;
        for i in 1..swing_end {
            if c[i].high > c[high_idx].high {
                high_idx = i;
                high_found = true;
            }
            if c[i].low < c[low_idx].low {
                low_idx = i;
                low_found = true;
            }
        }
        if !high_found && !low_found {
            return Vec::new();
        }

        let latest = c.len() - 1;
        let confirm = &c[c.len() - CONFIRM_BARS..];
        let mut signals = Vec::new();

        // Higher high in price, lower high in RSI
        if c[latest].high > c[high_idx].high && r[latest] < r[high_idx] {
            match reversal_direction(confirm) {
                Some(Direction::Down) => {
                    signals.push(Signal::new(input.symbol, Direction::Down, CONFIDENCE, TTL))
                }
                other => debug!(
                    "{}: bearish divergence without reversal (got {:?})",
                    input.symbol, other
                ),
            }
        }

        // Lower low in price, higher low in RSI
        if c[latest].low < c[low_idx].low && r[latest] > r[low_idx] {
            match reversal_direction(confirm) {
                Some(Direction::Up) => {
                    signals.push(Signal::new(input.symbol, Direction::Up, CONFIDENCE, TTL))
                }
                other => debug!(
                    "{}: bullish divergence without reversal (got {:?})",
                    input.symbol, other
                ),
            }
        }

        signals
    }
}
