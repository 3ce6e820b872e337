//! Fair-value rejection: a deep pullback into the slow EMA that is rejected
//! back through the fast EMA

use std::time::Duration;

use super::{PatternScanner, ScanInput};
use crate::types::{Direction, Signal};

const CONFIDENCE: f64 = 0.75;
const TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Default, Clone, Copy)]
pub struct FairValueScanner;

impl PatternScanner for FairValueScanner {
    fn name(&self) -> &'static str {
        "fair_value_rejection"
    }

    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal> {
        let n = input.candles.len();
        if n < 2 || input.ema_fast.len() != n || input.ema_slow.len() != n {
            return Vec::new();
        }

        let last = n - 1;
        let fast = input.ema_fast[last];
        let slow = input.ema_slow[last];
        let c = &input.candles[last];
        let mut signals = Vec::new();

        if fast > slow && c.low <= slow && c.close > fast {
            signals.push(Signal::new(input.symbol, Direction::Up, CONFIDENCE, TTL));
        }
        if fast < slow && c.high >= slow && c.close < fast {
            signals.push(Signal::new(input.symbol, Direction::Down, CONFIDENCE, TTL));
        }

        signals
    }
}
