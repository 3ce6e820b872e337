//! Injected observability hooks
//!
//! Components take an `Arc<dyn Observer>` instead of reaching for a global
//! logger. [`NoopObserver`] is the default; [`LogObserver`] forwards to tracing.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::feed::ConnectionState;

/// Why the adapter discarded an incoming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Decode,
    Invalid,
    Stale,
    Duplicate,
}

pub trait Observer: Send + Sync {
    fn on_state_change(&self, _state: ConnectionState) {}
    fn on_bar_dropped(&self, _symbol: &str, _reason: DropReason) {}
    fn on_bar_emitted(&self, _symbol: &str) {}
    fn on_reconnect(&self, _delay: Duration) {}
    fn on_signals(&self, _symbol: &str, _count: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_state_change(&self, state: ConnectionState) {
        debug!("feed state -> {:?}", state);
    }

    fn on_bar_dropped(&self, symbol: &str, reason: DropReason) {
        debug!("dropped bar for {:?}: {:?}", symbol, reason);
    }

    fn on_reconnect(&self, delay: Duration) {
        warn!("reconnecting in {:?}", delay);
    }

    fn on_signals(&self, symbol: &str, count: usize) {
        info!("{}: {} signal(s)", symbol, count);
    }
}
