//! Historical replay of the scanner
//!
//! Slides a fixed window over each symbol's bars, scans every window and
//! grades each signal by comparing the close at entry with the close at
//! expiry.

pub mod export;
pub mod loader;

pub use export::{export_report, ReportFormat};
pub use loader::load_bars_csv;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::indicators::{IndicatorSet, EMA_FAST_PERIOD, EMA_SLOW_PERIOD, RSI_PERIOD};
use crate::scanner::SignalScanner;
use crate::types::{Bar, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Neutral,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Loss => write!(f, "LOSS"),
            Outcome::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// One graded signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub outcome: Outcome,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub results: Vec<BacktestResult>,
    /// wins / (wins + losses), 0 when nothing resolved
    pub accuracy: f64,
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub neutrals: usize,
}

impl BacktestReport {
    fn record(&mut self, result: BacktestResult) {
        self.total += 1;
        match result.outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Neutral => self.neutrals += 1,
        }
        self.results.push(result);
    }

    fn finish(&mut self) {
        let resolved = self.wins + self.losses;
        if resolved > 0 {
            self.accuracy = self.wins as f64 / resolved as f64;
        }
    }
}

pub struct Backtester {
    pub window_size: usize,
    pub rsi_period: usize,
    pub ema_fast_period: usize,
    pub ema_slow_period: usize,
    /// Spacing of the input bars, used to turn delays into bar offsets
    pub bar_interval: Duration,
    pub scanner: SignalScanner,
}

impl Default for Backtester {
    fn default() -> Self {
        Self {
            window_size: 50,
            rsi_period: RSI_PERIOD,
            ema_fast_period: EMA_FAST_PERIOD,
            ema_slow_period: EMA_SLOW_PERIOD,
            bar_interval: Duration::from_secs(60),
            scanner: SignalScanner::default(),
        }
    }
}

impl Backtester {
    /// Replay every symbol in key order. `delay` is the wait between signal and
    /// entry, `expiry` the holding time after entry.
    pub fn run(
        &self,
        data: &BTreeMap<String, Vec<Bar>>,
        delay: Duration,
        expiry: Duration,
    ) -> BacktestReport {
        let mut report = BacktestReport::default();
        let entry_offset = self.bars_in(delay);
        let exit_offset = self.bars_in(expiry);
        let window_size = self.window_size.max(1);

        for (symbol, bars) in data {
            if bars.len() < window_size {
                warn!(
                    "Skipping {}: {} bars, need at least {}",
                    symbol,
                    bars.len(),
                    window_size
                );
                continue;
            }
            if !is_time_ordered(bars) {
                warn!("Skipping {}: bars are not in time order", symbol);
                continue;
            }

            let before = report.total;
            for i in (window_size - 1)..bars.len() {
                let window = &bars[i + 1 - window_size..=i];
                let ind = IndicatorSet::with_periods(
                    window,
                    self.rsi_period,
                    self.ema_fast_period,
                    self.ema_slow_period,
                );
                let signals = match self
                    .scanner
                    .scan(symbol, window, &ind.rsi, &ind.ema_fast, &ind.ema_slow)
                {
                    Ok(signals) if !signals.is_empty() => signals,
                    _ => continue,
                };

                let entry_idx = i.saturating_add(entry_offset);
                let exit_idx = entry_idx.saturating_add(exit_offset);
                if exit_idx >= bars.len() {
                    debug!("{}: signal at {} expires past the data", symbol, i);
                    continue;
                }

                let entry = &bars[entry_idx];
                let exit = &bars[exit_idx];
                for signal in signals {
                    let (outcome, reason) = grade(signal.direction, entry.close, exit.close);
                    report.record(BacktestResult {
                        symbol: symbol.clone(),
                        direction: signal.direction,
                        entry_time: entry.timestamp,
                        expiry_time: exit.timestamp,
                        outcome,
                        reason: reason.to_string(),
                    });
                }
            }
            debug!("{}: {} results", symbol, report.total - before);
        }

        report.finish();
        info!(
            "Backtest complete: {} results, {} wins, {} losses, {} neutral, accuracy {:.2}",
            report.total, report.wins, report.losses, report.neutrals, report.accuracy
        );
        report
    }

    fn bars_in(&self, span: Duration) -> usize {
        let interval = self.bar_interval.as_secs().max(1);
        usize::try_from(span.as_secs() / interval).unwrap_or(usize::MAX)
    }
}

fn grade(direction: Direction, entry: f64, exit: f64) -> (Outcome, &'static str) {
    if exit > entry {
        let outcome = match direction {
            Direction::Up => Outcome::Win,
            Direction::Down => Outcome::Loss,
        };
        (outcome, "closed above entry")
    } else if exit < entry {
        let outcome = match direction {
            Direction::Up => Outcome::Loss,
            Direction::Down => Outcome::Win,
        };
        (outcome, "closed below entry")
    } else {
        (Outcome::Neutral, "no change")
    }
}

fn is_time_ordered(bars: &[Bar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
