//! REST polling fallback
//!
//! Polls the last aggregate for each symbol on a fixed interval. Messages go
//! through the same [`BarFilter`] as the streaming adapter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::wire::BarFilter;
use super::MarketFeed;
use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::observer::{NoopObserver, Observer};
use crate::shutdown::Shutdown;
use crate::types::Bar;

pub struct RestPoller {
    config: FeedConfig,
    client: Client,
    observer: Arc<dyn Observer>,
}

impl RestPoller {
    pub fn new(config: FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| Error::Connection(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl MarketFeed for RestPoller {
    async fn subscribe(&self, symbols: &[String], shutdown: Shutdown) -> Result<mpsc::Receiver<Bar>> {
        self.config.validate(symbols)?;

        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let poll = Poll {
            client: self.client.clone(),
            filter: BarFilter::new(self.config.max_bar_age),
            config: self.config.clone(),
            observer: self.observer.clone(),
            symbols,
            tx,
            shutdown,
        };
        tokio::spawn(poll.run());

        Ok(rx)
    }
}

struct Poll {
    config: FeedConfig,
    client: Client,
    observer: Arc<dyn Observer>,
    filter: BarFilter,
    symbols: Vec<String>,
    tx: mpsc::Sender<Bar>,
    shutdown: Shutdown,
}

impl Poll {
    async fn run(mut self) {
        info!(
            "REST poller starting for {:?} every {:?}",
            self.symbols, self.config.poll_interval
        );
        let mut interval = tokio::time::interval(self.config.poll_interval);

        'outer: loop {
            tokio::select! {
                _ = self.shutdown.wait() => break,
                _ = interval.tick() => {}
            }

            for symbol in &self.symbols {
                let fetched = tokio::select! {
                    _ = self.shutdown.wait() => break 'outer,
                    res = fetch_last(&self.client, &self.config, symbol) => res,
                };
                let raw = match fetched {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!("REST request for {} failed: {}", symbol, e);
                        continue;
                    }
                };

                let bar = match self.filter.accept(&raw, Utc::now()) {
                    Ok(bar) => bar,
                    Err(reason) => {
                        debug!("Dropping polled bar for {} ({:?})", symbol, reason);
                        self.observer.on_bar_dropped(symbol, reason);
                        continue;
                    }
                };

                let sent = tokio::select! {
                    _ = self.shutdown.wait() => break 'outer,
                    res = self.tx.send(bar) => res,
                };
                if sent.is_err() {
                    info!("Bar consumer dropped, stopping poller");
                    break 'outer;
                }
                self.observer.on_bar_emitted(symbol);
            }
        }

        info!("REST poller stopped");
    }
}

async fn fetch_last(client: &Client, config: &FeedConfig, symbol: &str) -> Result<String> {
    let response = client
        .get(&config.rest_url)
        .query(&[("apikey", config.api_key.as_str()), ("symbol", symbol)])
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    if !status.is_success() {
        return Err(Error::Connection(format!("status {}: {}", status, body)));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::mock::wire_msg;
    use crate::shutdown;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal HTTP endpoint answering every request with a fresh bar
    async fn serve_bars() -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (req_tx, req_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let line = request.lines().next().unwrap_or_default().to_string();
                let _ = req_tx.send(line);

                let body = wire_msg("EURUSD", Utc::now(), 1.1);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/last", addr), req_rx)
    }

    #[tokio::test]
    async fn test_missing_key_fails_fast() {
        let poller = RestPoller::new(FeedConfig::default()).unwrap();
        let (_trigger, shutdown) = shutdown::channel();
        let res = poller.subscribe(&["EURUSD".to_string()], shutdown).await;
        assert!(matches!(res, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_polls_and_closes_on_shutdown() {
        let (url, mut requests) = serve_bars().await;
        let config = FeedConfig {
            api_key: "k3y&x=1".to_string(),
            rest_url: url,
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let poller = RestPoller::new(config).unwrap();
        let (trigger, shutdown) = shutdown::channel();

        let mut rx = poller
            .subscribe(&["EURUSD".to_string()], shutdown)
            .await
            .unwrap();

        let bar = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bar.symbol, "EURUSD");
        assert_eq!(bar.close, 1.1);

        let line = requests.recv().await.unwrap();
        // reserved characters in the key stay inside the apikey parameter
        assert!(line.starts_with("GET /last?apikey=k3y%26x%3D1&symbol=EURUSD "));

        trigger.trigger();
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
