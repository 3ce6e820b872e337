//! Pattern scanners and the signal merger
//!
//! Each scanner is a pure function of one window of candles plus its
//! indicator series. [`SignalScanner`] runs the registered scanners in order
//! and keeps the first signal for every (symbol, direction, TTL).

pub mod bounce;
pub mod candlestick;
pub mod crossover;
pub mod divergence;
pub mod fair_value;

pub use bounce::EmaBounceScanner;
pub use candlestick::CandlestickScanner;
pub use crossover::EmaCrossoverScanner;
pub use divergence::RsiDivergenceScanner;
pub use fair_value::FairValueScanner;

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::indicators::IndicatorSet;
use crate::types::{Bar, Signal};

/// Minimum window the merger accepts
pub const MIN_SCAN_BARS: usize = 20;

/// Read-only view handed to every scanner
#[derive(Debug, Clone, Copy)]
pub struct ScanInput<'a> {
    pub symbol: &'a str,
    pub candles: &'a [Bar],
    pub rsi: &'a [f64],
    pub ema_fast: &'a [f64],
    pub ema_slow: &'a [f64],
}

/// A single pattern detector. Implementations return nothing on short or
/// inconsistent input instead of failing.
pub trait PatternScanner: Send + Sync {
    fn name(&self) -> &'static str;
    fn scan(&self, input: &ScanInput<'_>) -> Vec<Signal>;
}

/// Runs every registered scanner over a window and merges the results
pub struct SignalScanner {
    scanners: Vec<Box<dyn PatternScanner>>,
}

impl Default for SignalScanner {
    /// All five detectors. Registration order decides which duplicate survives.
    fn default() -> Self {
        Self::with_scanners(vec![
            Box::new(RsiDivergenceScanner),
            Box::new(EmaCrossoverScanner),
            Box::new(CandlestickScanner),
            Box::new(EmaBounceScanner),
            Box::new(FairValueScanner),
        ])
    }
}

impl SignalScanner {
    pub fn with_scanners(scanners: Vec<Box<dyn PatternScanner>>) -> Self {
        Self { scanners }
    }

    pub fn scanner_names(&self) -> Vec<&'static str> {
        self.scanners.iter().map(|s| s.name()).collect()
    }

    /// Scan one window. Errors only when the window is shorter than
    /// [`MIN_SCAN_BARS`] or an indicator series does not line up with it.
    pub fn scan(
        &self,
        symbol: &str,
        candles: &[Bar],
        rsi: &[f64],
        ema_fast: &[f64],
        ema_slow: &[f64],
    ) -> Result<Vec<Signal>> {
        let n = candles.len();
        if n < MIN_SCAN_BARS || rsi.len() != n || ema_fast.len() != n || ema_slow.len() != n {
            let err = Error::InvalidInput {
                candles: n,
                rsi: rsi.len(),
                ema_fast: ema_fast.len(),
                ema_slow: ema_slow.len(),
            };
            warn!("{}: {}", symbol, err);
            return Err(err);
        }

        let input = ScanInput {
            symbol,
            candles,
            rsi,
            ema_fast,
            ema_slow,
        };

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for scanner in &self.scanners {
            for signal in scanner.scan(&input) {
                if seen.insert(signal.key()) {
                    debug!(
                        "{}: {} -> {} ({:.2})",
                        symbol,
                        scanner.name(),
                        signal.direction,
                        signal.confidence
                    );
                    merged.push(signal);
                }
            }
        }

        Ok(merged)
    }

    /// Compute the standard indicator set for `bars` and scan it
    pub fn scan_bars(&self, symbol: &str, bars: &[Bar]) -> Result<Vec<Signal>> {
        let ind = IndicatorSet::compute(bars);
        self.scan(symbol, bars, &ind.rsi, &ind.ema_fast, &ind.ema_slow)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::ScanInput;
    use crate::types::Bar;

    pub fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 14, 30, 0).unwrap()
    }

    /// One-minute bar `i` minutes after [`base_time`]
    pub fn bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            "EURUSD",
            base_time() + Duration::minutes(i),
            open,
            high,
            low,
            close,
            0.0,
        )
    }

    pub fn input<'a>(
        candles: &'a [Bar],
        rsi: &'a [f64],
        ema_fast: &'a [f64],
        ema_slow: &'a [f64],
    ) -> ScanInput<'a> {
        ScanInput {
            symbol: "EURUSD",
            candles,
            rsi,
            ema_fast,
            ema_slow,
        }
    }

    /// The four bars that end a bullish divergence: a swing low at index 16
    /// and a final bar that either engulfs (bullish) or closes weak.
    pub fn divergence_tail(offset: i64, bullish: bool) -> Vec<Bar> {
        let last_close = if bullish { 0.8 } else { 0.45 };
        vec![
            bar(offset, 0.7, 0.8, 0.5, 0.6),
            bar(offset + 1, 0.65, 0.75, 0.55, 0.6),
            bar(offset + 2, 0.6, 0.65, 0.45, 0.5),
            bar(offset + 3, 0.48, 0.9, 0.4, last_close),
        ]
    }

    /// 20 bars with a swing low at 16 (RSI 30) and a lower low at 19 with a
    /// higher RSI. EMAs are flat so only the divergence and candle scanners
    /// can react.
    pub fn bullish_divergence_window(bullish: bool) -> (Vec<Bar>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut candles: Vec<Bar> = (0..16).map(|i| bar(i, 1.0, 1.0, 1.0, 1.0)).collect();
        candles.extend(divergence_tail(16, bullish));

        let mut rsi: Vec<f64> = (0..20).map(|i| 50.0 - i as f64).collect();
        rsi[16] = 30.0;
        rsi[17] = 32.0;
        rsi[18] = 31.0;
        rsi[19] = 40.0;

        (candles, rsi, vec![1.0; 20], vec![1.0; 20])
    }
}
