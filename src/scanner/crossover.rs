//! EMA interaction: fast EMA crossing the slow EMA on the latest bar

use std::time::Duration;

use super::{PatternScanner, ScanInput};
use crate::types::{Direction, Signal};

const CONFIDENCE: f64 = 0.6;
const TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy)]
pub struct EmaCrossoverScanner;

impl PatternScanner for EmaCrossoverScanner {
    fn name(&self) -> &'static str {
        "ema_crossover"
    }

    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal> {
        let n = input.candles.len();
        if n < 2 || input.ema_fast.len() != n || input.ema_slow.len() != n {
            return Vec::new();
        }

        let (prev, last) = (n - 2, n - 1);
        let fast = input.ema_fast;
        let slow = input.ema_slow;
        let close = input.candles[last].close;
        let mut signals = Vec::new();

        // Cross must be confirmed by the close sitting on the breakout side
        if fast[prev] <= slow[prev] && fast[last] > slow[last] && close > fast[last] {
            signals.push(Signal::new(input.symbol, Direction::Up, CONFIDENCE, TTL));
        }
        if fast[prev] >= slow[prev] && fast[last] < slow[last] && close < fast[last] {
            signals.push(Signal::new(input.symbol, Direction::Down, CONFIDENCE, TTL));
        }
        signals
    }
}
