//! EMA bounce: a shallow pullback to the fast EMA that closes back on the trend side

use std::time::Duration;

use super::{PatternScanner, ScanInput};
use crate::types::{Direction, Signal};

const CONFIDENCE: f64 = 0.7;
const TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Default, Clone, Copy)]
pub struct EmaBounceScanner;

impl PatternScanner for EmaBounceScanner {
    fn name(&self) -> &'static str {
        "ema_bounce"
    }

    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal> {
        let n = input.candles.len();
        if n < 2 || input.ema_fast.len() != n || input.ema_slow.len() != n {
            return Vec::new();
        }

        let (prev, last) = (n - 2, n - 1);
        let fast = input.ema_fast;
        let slow = input.ema_slow;
        let p = &input.candles[prev];
        let c = &input.candles[last];
        let mut signals = Vec::new();

        let uptrend = fast[prev] > slow[prev] && fast[last] > slow[last];
        if uptrend && p.close > fast[prev] && c.low <= fast[last] && c.close > fast[last] {
            signals.push(Signal::new(input.symbol, Direction::Up, CONFIDENCE, TTL));
        }

        let downtrend = fast[prev] < slow[prev] && fast[last] < slow[last];
        if downtrend && p.close < fast[prev] && c.high >= fast[last] && c.close < fast[last] {
            signals.push(Signal::new(input.symbol, Direction::Down, CONFIDENCE, TTL));
        }

        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::testutil::{bar, input};

    #[test]
    fn test_bounce_up() {
        let candles = vec![bar(0, 1.10, 1.14, 1.09, 1.12), bar(1, 1.11, 1.13, 1.095, 1.12)];
        let rsi = vec![55.0; 2];
        let fast = vec![1.10, 1.10];
        let slow = vec![1.05, 1.06];
        let sigs = EmaBounceScanner.scan(&input(&candles, &rsi, &fast, &slow));
        assert_eq!(sigs, vec![Signal::new("EURUSD", Direction::Up, 0.7, TTL)]);
    }

    #[test]
    fn test_bounce_down() {
        let candles = vec![bar(0, 0.90, 0.91, 0.86, 0.88), bar(1, 0.89, 0.905, 0.87, 0.88)];
        let rsi = vec![45.0; 2];
        let fast = vec![0.90, 0.90];
        let slow = vec![0.95, 0.94];
        let sigs = EmaBounceScanner.scan(&input(&candles, &rsi, &fast, &slow));
        assert_eq!(sigs, vec![Signal::new("EURUSD", Direction::Down, 0.7, TTL)]);
    }

    #[test]
    fn test_no_touch_no_signal() {
        let candles = vec![bar(0, 1.10, 1.14, 1.09, 1.12), bar(1, 1.12, 1.15, 1.11, 1.14)];
        let rsi = vec![55.0; 2];
        let fast = vec![1.10, 1.10];
        let slow = vec![1.05, 1.06];
        assert!(EmaBounceScanner.scan(&input(&candles, &rsi, &fast, &slow)).is_empty());
    }

    #[test]
    fn test_flat_emas_do_not_define_a_trend() {
        let candles = vec![bar(0, 1.0, 1.1, 0.9, 1.05), bar(1, 1.0, 1.1, 0.9, 1.05)];
        let rsi = vec![50.0; 2];
        let ema = vec![1.0; 2];
        assert!(EmaBounceScanner.scan(&input(&candles, &rsi, &ema, &ema)).is_empty());
    }
}
