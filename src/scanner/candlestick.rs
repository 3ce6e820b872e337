//! Candlestick classification
//!
//! Engulfing and pin-bar primitives. The divergence scanner reuses these to
//! confirm reversals.

use std::time::Duration;

use super::{PatternScanner, ScanInput};
use crate::types::{Bar, Direction, Signal};

const CONFIDENCE: f64 = 0.5;
const TTL: Duration = Duration::from_secs(60);

pub fn body(c: &Bar) -> f64 {
    (c.close - c.open).abs()
}

pub fn range(c: &Bar) -> f64 {
    c.high - c.low
}

/// Small body with a long lower wick
pub fn is_bullish_pin_bar(c: &Bar) -> bool {
    let r = range(c);
    if r == 0.0 {
        return false;
    }
    let lower_wick = c.open.min(c.close) - c.low;
    body(c) <= r / 3.0 && lower_wick >= r * 2.0 / 3.0
}

/// Small body with a long upper wick
pub fn is_bearish_pin_bar(c: &Bar) -> bool {
    let r = range(c);
    if r == 0.0 {
        return false;
    }
    let upper_wick = c.high - c.open.max(c.close);
    body(c) <= r / 3.0 && upper_wick >= r * 2.0 / 3.0
}

/// Bullish candle at `i` whose body swallows the bearish body before it
pub fn is_bullish_engulfing(candles: &[Bar], i: usize) -> bool {
    if i == 0 || i >= candles.len() {
        return false;
    }
    let prev = &candles[i - 1];
    let cur = &candles[i];
    if !cur.is_bullish() || !prev.is_bearish() {
        return false;
    }
    cur.open < prev.close && cur.close > prev.open
}

/// Bearish candle at `i` whose body swallows the bullish body before it
pub fn is_bearish_engulfing(candles: &[Bar], i: usize) -> bool {
    if i == 0 || i >= candles.len() {
        return false;
    }
    let prev = &candles[i - 1];
    let cur = &candles[i];
    if !cur.is_bearish() || !prev.is_bullish() {
        return false;
    }
    cur.open > prev.close && cur.close < prev.open
}

pub fn is_bullish_reversal(candles: &[Bar], i: usize) -> bool {
    is_bullish_engulfing(candles, i) || is_bullish_pin_bar(&candles[i])
}

pub fn is_bearish_reversal(candles: &[Bar], i: usize) -> bool {
    is_bearish_engulfing(candles, i) || is_bearish_pin_bar(&candles[i])
}

/// Newest reversal pattern in `candles`, bullish checked first on each bar
pub fn reversal_direction(candles: &[Bar]) -> Option<Direction> {
    (0..candles.len()).rev().find_map(|i| {
        if is_bullish_reversal(candles, i) {
            Some(Direction::Up)
        } else if is_bearish_reversal(candles, i) {
            Some(Direction::Down)
        } else {
            None
        }
    })
}

/// Engulfing / pin-bar detector on the latest bar
#[derive(Debug, Default, Clone, Copy)]
pub struct CandlestickScanner;

impl PatternScanner for CandlestickScanner {
    fn name(&self) -> &'static str {
        "candlestick"
    }

    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal> {
        let candles = input.candles;
        if candles.len() < 2 {
            return Vec::new();
        }

        let last = candles.len() - 1;
        let mut signals = Vec::new();
        if is_bullish_reversal(candles, last) {
            signals.push(Signal::new(input.symbol, Direction::Up, CONFIDENCE, TTL));
        }
        if is_bearish_reversal(candles, last) {
            signals.push(Signal::new(input.symbol, Direction::Down, CONFIDENCE, TTL));
        }
        signals
    }
}
