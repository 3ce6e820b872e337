//! Live signal loop
//!
//! Consumes bars from a [`MarketFeed`], keeps a rolling window per symbol and
//! publishes whatever the scanner finds once a window is long enough.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::feed::MarketFeed;
use crate::history::BarHistory;
use crate::indicators::IndicatorSet;
use crate::observer::Observer;
use crate::publish::{format_signals, Publisher};
use crate::scanner::SignalScanner;
use crate::shutdown::Shutdown;
use crate::types::Bar;

pub struct Orchestrator {
    feed: Arc<dyn MarketFeed>,
    publisher: Arc<dyn Publisher>,
    observer: Arc<dyn Observer>,
    scanner: SignalScanner,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(
        feed: Arc<dyn MarketFeed>,
        publisher: Arc<dyn Publisher>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            feed,
            publisher,
            observer,
            scanner: SignalScanner::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_scanner(mut self, scanner: SignalScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run until the feed closes (`Ok`) or shutdown fires (`Error::Cancelled`)
    pub async fn run(&self, symbols: &[String], mut shutdown: Shutdown) -> Result<()> {
        let mut rx = self.feed.subscribe(symbols, shutdown.clone()).await?;
        info!("Orchestrator running for {:?}", symbols);

        let mut histories: HashMap<String, BarHistory> = HashMap::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    info!("Orchestrator cancelled");
                    return Err(Error::Cancelled);
                }
                next = rx.recv() => match next {
                    Some(bar) => self.on_bar(&mut histories, bar, &mut shutdown).await?,
                    None => {
                        info!("Market feed closed, orchestrator exiting");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Only a shutdown during publish is an error; scan and publish failures are logged
    async fn on_bar(
        &self,
        histories: &mut HashMap<String, BarHistory>,
        bar: Bar,
        shutdown: &mut Shutdown,
    ) -> Result<()> {
        let symbol = bar.symbol.clone();
        let history = histories
            .entry(symbol.clone())
            .or_insert_with(|| BarHistory::new(self.config.history_capacity));
        history.push(bar);

        if history.len() < self.config.min_scan_bars {
            return Ok(());
        }

        let window = history.window();
        let ind = IndicatorSet::compute(window);
        let signals = match self
            .scanner
            .scan(&symbol, window, &ind.rsi, &ind.ema_fast, &ind.ema_slow)
        {
            Ok(signals) => signals,
            Err(e) => {
                warn!("Scan failed for {}: {}", symbol, e);
                return Ok(());
            }
        };
        if signals.is_empty() {
            return Ok(());
        }

        debug!("{}: {} signal(s)", symbol, signals.len());
        self.observer.on_signals(&symbol, signals.len());

        let messages = format_signals(&signals);
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!("Orchestrator cancelled while publishing for {}", symbol);
                Err(Error::Cancelled)
            }
            res = self.publisher.publish(&messages) => {
                if let Err(e) = res {
                    error!("Failed to publish signals for {}: {:#}", symbol, e);
                }
                Ok(())
            }
        }
    }
}
