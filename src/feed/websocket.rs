//! Websocket connector for the streaming aggregate feed

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::{Connector, FeedConnection};
use crate::config::FeedConfig;
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscription request sent right after the handshake
#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    action: &'a str,
    symbols: String,
}

/// Dials `ws_url?apikey=...` and subscribes to the configured symbols
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    api_key: String,
    ping_interval: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ping_interval: FeedConfig::default().ping_interval,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.ws_url.clone(), config.api_key.clone())
            .with_ping_interval(config.ping_interval)
    }

    pub fn with_ping_interval(mut self, period: Duration) -> Self {
        self.ping_interval = period;
        self
    }

    fn endpoint(&self) -> String {
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}apikey={}", self.url, sep, self.api_key)
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, symbols: &[String]) -> Result<Box<dyn FeedConnection>> {
        info!("Connecting to market feed at {}", self.url);

        let (mut stream, _response) = connect_async(self.endpoint())
            .await
            .map_err(|e| Error::Connection(format!("dial failed: {}", e)))?;

        let request = SubscribeRequest {
            action: "subscribe",
            symbols: symbols.join(","),
        };
        let payload = serde_json::to_string(&request)?;
        stream
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| Error::Connection(format!("subscribe failed: {}", e)))?;

        let period = self.ping_interval.max(Duration::from_millis(1));
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Box::new(WsConnection { stream, ping }))
    }
}

struct WsConnection {
    stream: WsStream,
    /// Keep-alive schedule, driven from `next_message`
    ping: Interval,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn next_message(&mut self) -> Result<Option<String>> {
        loop {
            let next = tokio::select! {
                next = self.stream.next() => next,
                _ = self.ping.tick() => {
                    debug!("Sending keep-alive ping");
                    self.stream
                        .send(Message::Ping(Default::default()))
                        .await
                        .map_err(|e| Error::Connection(format!("ping failed: {}", e)))?;
                    continue;
                }
            };

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => {
                    return Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Feed sent close frame: {:?}", frame);
                    return Ok(None);
                }
                // Pings are answered by tungstenite on the next read
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(Error::Connection(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
