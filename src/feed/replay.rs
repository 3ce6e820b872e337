//! In-memory feed that replays recorded bars

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::MarketFeed;
use crate::error::{Error, Result};
use crate::shutdown::Shutdown;
use crate::types::Bar;

/// Replays bars in order, keeping only the subscribed symbols.
///
/// The channel closes once the bars run out unless `hold_open` is set, in which
/// case it stays open until shutdown.
#[derive(Debug, Clone, Default)]
pub struct ReplayFeed {
    bars: Vec<Bar>,
    pace: Option<Duration>,
    hold_open: bool,
    capacity: usize,
}

impl ReplayFeed {
    pub fn new(bars: Vec<Bar>) -> Self {
        Self {
            bars,
            pace: None,
            hold_open: false,
            capacity: 256,
        }
    }

    /// Sleep between bars
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl MarketFeed for ReplayFeed {
    async fn subscribe(&self, symbols: &[String], mut shutdown: Shutdown) -> Result<mpsc::Receiver<Bar>> {
        if symbols.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::Config("no symbols provided".to_string()));
        }

        let bars: Vec<Bar> = self
            .bars
            .iter()
            .filter(|bar| symbols.iter().any(|s| s.trim() == bar.symbol))
            .cloned()
            .collect();
        let pace = self.pace;
        let hold_open = self.hold_open;
        let (tx, rx) = mpsc::channel(self.capacity.max(1));

        tokio::spawn(async move {
            debug!("Replaying {} bars", bars.len());
            for bar in bars {
                if let Some(pace) = pace {
                    tokio::select! {
                        _ = shutdown.wait() => return,
                        _ = tokio::time::sleep(pace) => {}
                    }
                }
                tokio::select! {
                    _ = shutdown.wait() => return,
                    res = tx.send(bar) => {
                        if res.is_err() {
                            return;
                        }
                    }
                }
            }
            if hold_open {
                shutdown.wait().await;
            }
            debug!("Replay finished");
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::testutil::bar;
    use crate::shutdown;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_replays_subscribed_symbols_then_closes() {
        let mut other = bar(1, 1.0, 1.0, 1.0, 1.0);
        other.symbol = "GBPUSD".to_string();
        let feed = ReplayFeed::new(vec![
            bar(0, 1.0, 1.0, 1.0, 1.0),
            other,
            bar(2, 1.0, 1.0, 1.0, 1.2),
        ]);

        let (_trigger, shutdown) = shutdown::channel();
        let mut rx = feed.subscribe(&symbols(&["EURUSD"]), shutdown).await.unwrap();

        let mut closes = Vec::new();
        while let Some(bar) = rx.recv().await {
            closes.push(bar.close);
        }
        assert_eq!(closes, vec![1.0, 1.2]);
    }

    #[tokio::test]
    async fn test_hold_open_until_shutdown() {
        let feed = ReplayFeed::new(vec![bar(0, 1.0, 1.0, 1.0, 1.0)]).hold_open();
        let (trigger, shutdown) = shutdown::channel();
        let mut rx = feed.subscribe(&symbols(&["EURUSD"]), shutdown).await.unwrap();

        assert!(rx.recv().await.is_some());
        let pending = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(pending.is_err());

        trigger.trigger();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_requires_symbols() {
        let (_trigger, shutdown) = shutdown::channel();
        let res = ReplayFeed::new(Vec::new()).subscribe(&[], shutdown).await;
        assert!(matches!(res, Err(Error::Config(_))));
    }
}
