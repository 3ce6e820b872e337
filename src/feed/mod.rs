//! Market feed
//!
//! The adapter owns one long-running task per subscription that dials the
//! feed, decodes wire messages into [`Bar`]s and pushes them into a bounded
//! channel. Transient faults (dial failures, read errors, silence) are handled
//! inside the task and show up to the consumer only as gaps in the stream.
//!
//! # Components
//!
//! - [`adapter`] - reconnecting state machine generic over a [`Connector`]
//! - [`websocket`] - tokio-tungstenite connector
//! - [`rest`] - REST polling fallback
//! - [`replay`] - in-memory feed for replays and tests
//! - [`wire`] - message decoding, validation and duplicate suppression
//! - [`backoff`] - reconnect delay schedule

pub mod adapter;
pub mod backoff;
pub mod replay;
pub mod rest;
pub mod websocket;
pub mod wire;

pub use adapter::FeedAdapter;
pub use backoff::Backoff;
pub use replay::ReplayFeed;
pub use rest::RestPoller;
pub use websocket::WsConnector;
pub use wire::BarFilter;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::shutdown::Shutdown;
use crate::types::Bar;

/// Adapter connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Stale,
    ErrorReconnect,
}

/// Source of normalized bars.
///
/// The returned channel stays open until `shutdown` fires (or the source runs
/// out of data) and is closed exactly once.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn subscribe(&self, symbols: &[String], shutdown: Shutdown) -> Result<mpsc::Receiver<Bar>>;
}

/// Dials the feed and sends the subscription request
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, symbols: &[String]) -> Result<Box<dyn FeedConnection>>;
}

/// One live connection. `Ok(None)` means the peer closed it.
#[async_trait]
pub trait FeedConnection: Send {
    async fn next_message(&mut self) -> Result<Option<String>>;

    async fn close(&mut self) {}
}
