//! Reconnecting market feed adapter
//!
//! Disconnected -> Connecting -> Subscribed -> Streaming -> {Stale, ErrorReconnect} -> Disconnected

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::wire::BarFilter;
use super::{ConnectionState, Connector, FeedConnection, MarketFeed};
use crate::config::FeedConfig;
use crate::error::Result;
use crate::observer::{NoopObserver, Observer};
use crate::shutdown::Shutdown;
use crate::types::Bar;

/// Streams bars from a [`Connector`], reconnecting with exponential backoff
pub struct FeedAdapter<C: Connector> {
    config: FeedConfig,
    connector: Arc<C>,
    observer: Arc<dyn Observer>,
}

impl<C: Connector> FeedAdapter<C> {
    pub fn new(config: FeedConfig, connector: C) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

#[async_trait]
impl<C: Connector> MarketFeed for FeedAdapter<C> {
    async fn subscribe(&self, symbols: &[String], shutdown: Shutdown) -> Result<mpsc::Receiver<Bar>> {
        self.config.validate(symbols)?;

        let symbols: Vec<String> = symbols
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        let worker = Worker {
            backoff: Backoff::new(self.config.backoff_base, self.config.backoff_max),
            filter: BarFilter::new(self.config.max_bar_age),
            config: self.config.clone(),
            connector: self.connector.clone(),
            observer: self.observer.clone(),
            state: ConnectionState::Disconnected,
            symbols,
            tx,
            shutdown,
        };
        tokio::spawn(worker.run());

        Ok(rx)
    }
}

/// How a streaming session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Shutdown fired or the consumer went away; stop for good
    Finished,
    /// Nothing emitted for too long
    Stale,
    /// Read failed or the peer hung up
    Failed,
}

struct Worker<C: Connector> {
    config: FeedConfig,
    connector: Arc<C>,
    observer: Arc<dyn Observer>,
    filter: BarFilter,
    backoff: Backoff,
    state: ConnectionState,
    symbols: Vec<String>,
    tx: mpsc::Sender<Bar>,
    shutdown: Shutdown,
}

impl<C: Connector> Worker<C> {
    /// Runs until shutdown. Dropping `self.tx` on return closes the stream.
    async fn run(mut self) {
        info!("Market feed starting for {:?}", self.symbols);

        while !self.shutdown.is_triggered() {
            self.set_state(ConnectionState::Connecting);

            let mut shutdown = self.shutdown.clone();
            let attempt = tokio::select! {
                _ = shutdown.wait() => break,
                res = self.connector.connect(&self.symbols) => res,
            };

            match attempt {
                Ok(conn) => {
                    self.backoff.reset();
                    self.set_state(ConnectionState::Subscribed);
                    info!("Subscribed to {:?}", self.symbols);

                    match self.stream(conn).await {
                        SessionEnd::Finished => break,
                        SessionEnd::Stale => self.set_state(ConnectionState::Stale),
                        SessionEnd::Failed => self.set_state(ConnectionState::ErrorReconnect),
                    }
                }
                Err(e) => {
                    warn!("Feed connect failed: {}", e);
                    self.set_state(ConnectionState::ErrorReconnect);
                }
            }

            self.set_state(ConnectionState::Disconnected);
            if !self.wait_backoff().await {
                break;
            }
        }

        self.set_state(ConnectionState::Disconnected);
        info!("Market feed stopped");
    }

    /// Sleep for the next backoff delay. Returns false if shutdown fired meanwhile.
    async fn wait_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        self.observer.on_reconnect(delay);
        debug!("Reconnecting in {:?}", delay);

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = shutdown.wait() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    async fn stream(&mut self, mut conn: Box<dyn FeedConnection>) -> SessionEnd {
        let mut shutdown = self.shutdown.clone();
        let mut last_emit = Instant::now();

        let end = loop {
            let idle = last_emit.elapsed();
            if idle >= self.config.stale_after {
                warn!("No bars for {:?}, reconnecting", idle);
                break SessionEnd::Stale;
            }
            // Wake at the staleness boundary even if reads keep timing out
            let deadline = self.config.read_timeout.min(self.config.stale_after - idle);

            let read = tokio::select! {
                _ = shutdown.wait() => break SessionEnd::Finished,
                res = tokio::time::timeout(deadline, conn.next_message()) => res,
            };

            let raw = match read {
                Err(_) => {
                    debug!("No message within {:?}", deadline);
                    continue;
                }
                Ok(Err(e)) => {
                    warn!("Feed read error: {}", e);
                    break SessionEnd::Failed;
                }
                Ok(Ok(None)) => {
                    warn!("Feed connection closed by peer");
                    break SessionEnd::Failed;
                }
                Ok(Ok(Some(raw))) => raw,
            };

            let bar = match self.filter.accept(&raw, Utc::now()) {
                Ok(bar) => bar,
                Err(reason) => {
                    debug!("Dropping message ({:?}): {}", reason, truncate(&raw, 120));
                    self.observer.on_bar_dropped(&symbol_hint(&raw), reason);
                    continue;
                }
            };

            let symbol = bar.symbol.clone();
            let sent = tokio::select! {
                biased;
                _ = shutdown.wait() => break SessionEnd::Finished,
                res = self.tx.send(bar) => res,
            };
            if sent.is_err() {
                info!("Bar consumer dropped, stopping feed");
                break SessionEnd::Finished;
            }

            last_emit = Instant::now();
            self.observer.on_bar_emitted(&symbol);
            if self.state != ConnectionState::Streaming {
                self.set_state(ConnectionState::Streaming);
            }
        };

        conn.close().await;
        end
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Feed state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.observer.on_state_change(state);
        }
    }
}

fn truncate(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

/// Best-effort symbol for drop notifications on messages that may not decode
fn symbol_hint(raw: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
        return String::new();
    };
    value
        .get("s")
        .or_else(|| value.get("symbol"))
        .and_then(|s| s.as_str())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::feed::mock::{wire_msg, MockConnector};
    use crate::shutdown;
    use parking_lot::Mutex;
    use std::time::Duration;

    fn config() -> FeedConfig {
        FeedConfig {
            api_key: "test".to_string(),
            ..Default::default()
        }
    }

    fn symbols() -> Vec<String> {
        vec!["EURUSD".to_string()]
    }

    #[derive(Default)]
    struct Recorder {
        delays: Mutex<Vec<Duration>>,
        states: Mutex<Vec<ConnectionState>>,
    }

    impl Observer for Recorder {
        fn on_reconnect(&self, delay: Duration) {
            self.delays.lock().push(delay);
        }

        fn on_state_change(&self, state: ConnectionState) {
            self.states.lock().push(state);
        }
    }

    #[tokio::test]
    async fn test_config_errors_are_immediate() {
        let (_trigger, shutdown) = shutdown::channel();

        let adapter = FeedAdapter::new(FeedConfig::default(), MockConnector::new());
        let err = adapter.subscribe(&symbols(), shutdown.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let adapter = FeedAdapter::new(config(), MockConnector::new());
        let err = adapter.subscribe(&[], shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(adapter.connector().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_and_drops_duplicates() {
        let (_trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let script = connector.connection();

        let now = Utc::now();
        let t1 = now - chrono::Duration::seconds(2);
        let t2 = now - chrono::Duration::seconds(1);
        script.send(Ok(wire_msg("EURUSD", t1, 1.0))).unwrap();
        script.send(Ok(wire_msg("EURUSD", t1, 1.0))).unwrap();
        script.send(Ok("garbage".to_string())).unwrap();
        script.send(Ok(wire_msg("EURUSD", t2, 1.1))).unwrap();

        let adapter = FeedAdapter::new(config(), connector);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.timestamp.timestamp_millis(), t1.timestamp_millis());
        assert_eq!(second.timestamp.timestamp_millis(), t2.timestamp_millis());
        assert_eq!(second.close, 1.1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_when_stale() {
        let (_trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let first = connector.connection();
        let second = connector.connection();

        first
            .send(Ok(wire_msg("EURUSD", Utc::now(), 1.0)))
            .unwrap();
        // `first` stays open but silent from here on
        second
            .send(Ok(wire_msg("EURUSD", Utc::now() + chrono::Duration::milliseconds(10), 1.2)))
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let adapter =
            FeedAdapter::new(config(), connector).with_observer(recorder.clone() as Arc<dyn Observer>);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        let started = Instant::now();
        assert_eq!(rx.recv().await.unwrap().close, 1.0);
        assert_eq!(rx.recv().await.unwrap().close, 1.2);

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(adapter.connector().connects(), 2);
        assert!(recorder.states.lock().contains(&ConnectionState::Stale));
        drop(first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_read_error() {
        let (_trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let first = connector.connection();
        let second = connector.connection();

        first
            .send(Err(Error::Connection("reset by peer".to_string())))
            .unwrap();
        second
            .send(Ok(wire_msg("EURUSD", Utc::now(), 1.3)))
            .unwrap();

        let adapter = FeedAdapter::new(config(), connector);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().close, 1.3);
        assert_eq!(adapter.connector().connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_grows_then_resets() {
        let (_trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new().fail().fail().fail();
        let conn = connector.connection();
        conn.send(Ok(wire_msg("EURUSD", Utc::now(), 1.0))).unwrap();
        drop(conn); // peer closes after one bar

        let recorder = Arc::new(Recorder::default());
        let adapter =
            FeedAdapter::new(config(), connector).with_observer(recorder.clone() as Arc<dyn Observer>);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        assert_eq!(rx.recv().await.unwrap().close, 1.0);
        // let the closed session hit the next backoff
        tokio::time::sleep(Duration::from_millis(10)).await;

        let delays = recorder.delays.lock().clone();
        assert_eq!(
            &delays[..4],
            &[
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(1),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_stream() {
        let (trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let _silent = connector.connection();

        let adapter = FeedAdapter::new(config(), connector);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        trigger.trigger();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let (trigger, shutdown) = shutdown::channel();
        trigger.trigger();

        let adapter = FeedAdapter::new(config(), MockConnector::new());
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(adapter.connector().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_unblocks_full_channel() {
        let (trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let script = connector.connection();

        let now = Utc::now();
        script
            .send(Ok(wire_msg("EURUSD", now - chrono::Duration::seconds(2), 1.0)))
            .unwrap();
        script
            .send(Ok(wire_msg("EURUSD", now - chrono::Duration::seconds(1), 1.1)))
            .unwrap();

        let config = FeedConfig {
            channel_capacity: 1,
            ..config()
        };
        let adapter = FeedAdapter::new(config, connector);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        // first bar fills the channel, the worker parks on the second
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            let mut closes = Vec::new();
            while let Some(bar) = rx.recv().await {
                closes.push(bar.close);
            }
            closes
        })
        .await
        .expect("stream should close after shutdown");
        assert_eq!(drained, vec![1.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_despite_rejected_traffic() {
        let (_trigger, shutdown) = shutdown::channel();
        let connector = MockConnector::new();
        let first = connector.connection();
        let second = connector.connection();

        first
            .send(Ok(wire_msg("EURUSD", Utc::now(), 1.0)))
            .unwrap();
        // keep the first session chatty with messages that never become bars
        tokio::spawn(async move {
            for _ in 0..60 {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if first.send(Ok("garbage".to_string())).is_err() {
                    break;
                }
            }
        });
        second
            .send(Ok(wire_msg("EURUSD", Utc::now() + chrono::Duration::milliseconds(10), 1.2)))
            .unwrap();

        let recorder = Arc::new(Recorder::default());
        let adapter =
            FeedAdapter::new(config(), connector).with_observer(recorder.clone() as Arc<dyn Observer>);
        let mut rx = adapter.subscribe(&symbols(), shutdown).await.unwrap();

        let started = Instant::now();
        assert_eq!(rx.recv().await.unwrap().close, 1.0);
        assert_eq!(rx.recv().await.unwrap().close, 1.2);

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(40));
        assert_eq!(adapter.connector().connects(), 2);
        assert!(recorder.states.lock().contains(&ConnectionState::Stale));
    }

    #[test]
    fn test_symbol_hint() {
        assert_eq!(symbol_hint(r#"{"s":"EURUSD","t":1}"#), "EURUSD");
        assert_eq!(symbol_hint(r#"{ "symbol" : "GBPUSD", "c": "bad" }"#), "GBPUSD");
        assert_eq!(symbol_hint(r#"{"t":1,"s" : "USDJPY"}"#), "USDJPY");
        assert_eq!(symbol_hint(r#"{"s":7}"#), "");
        assert_eq!(symbol_hint("garbage"), "");
        assert_eq!(truncate("abcdef", 3), "abc");
    }
}
