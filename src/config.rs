//! Configuration for the market feed and the scanning engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_WS_URL: &str = "wss://api.finage.co.uk/agg";
pub const DEFAULT_REST_URL: &str = "https://api.finage.co.uk/last";

/// Connection and hygiene settings for the market feed adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Feed API key (required)
    pub api_key: String,

    /// Streaming endpoint
    pub ws_url: String,

    /// REST endpoint used by the poll fallback
    pub rest_url: String,

    /// Per-message read deadline
    pub read_timeout: Duration,

    /// Reconnect when nothing has been emitted for this long
    pub stale_after: Duration,

    /// Websocket keep-alive ping period
    pub ping_interval: Duration,

    /// Drop bars older than this relative to receipt time
    pub max_bar_age: Duration,

    /// First reconnect delay
    pub backoff_base: Duration,

    /// Upper bound for the reconnect delay
    pub backoff_max: Duration,

    /// Poll interval for the REST fallback
    pub poll_interval: Duration,

    /// Capacity of the bar channel handed to the consumer
    pub channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            ws_url: DEFAULT_WS_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            read_timeout: Duration::from_secs(15),
            stale_after: Duration::from_secs(30),
            ping_interval: Duration::from_secs(30),
            max_bar_age: Duration::from_secs(5),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            channel_capacity: 256,
        }
    }
}

impl FeedConfig {
    /// Build from environment variables, falling back to defaults
    ///
    /// - `FINAGE_API_KEY`
    /// - `FINAGE_WS_URL`
    /// - `FINAGE_REST_URL`
    /// - `FINAGE_HEALTH_INTERVAL` (seconds, websocket ping period)
    /// - `FINAGE_STALE_AFTER` (seconds, staleness threshold)
    /// - `FINAGE_REST_INTERVAL` (seconds)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_key: var("FINAGE_API_KEY").unwrap_or_default(),
            ws_url: var("FINAGE_WS_URL").unwrap_or(defaults.ws_url),
            rest_url: var("FINAGE_REST_URL").unwrap_or(defaults.rest_url),
            ping_interval: secs_var(&var, "FINAGE_HEALTH_INTERVAL")?
                .unwrap_or(defaults.ping_interval),
            stale_after: secs_var(&var, "FINAGE_STALE_AFTER")?.unwrap_or(defaults.stale_after),
            poll_interval: secs_var(&var, "FINAGE_REST_INTERVAL")?
                .unwrap_or(defaults.poll_interval),
            ..defaults
        })
    }

    /// Startup checks. These are configuration errors and are never retried.
    pub fn validate(&self, symbols: &[String]) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::Config("FINAGE_API_KEY not configured".to_string()));
        }
        if symbols.iter().all(|s| s.trim().is_empty()) {
            return Err(Error::Config("no symbols provided".to_string()));
        }
        Ok(())
    }
}

fn secs_var(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    match var(key) {
        Some(raw) => parse_secs(&raw)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("{} must be a number of seconds, got {:?}", key, raw))),
        None => Ok(None),
    }
}

/// Accepts "30" or "30s"
fn parse_secs(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('s').unwrap_or(trimmed);
    trimmed.parse::<u64>().ok().map(Duration::from_secs)
}

/// Sizes used by the live orchestrator and the backtester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bars kept per symbol
    pub history_capacity: usize,

    /// Bars required before scanning
    pub min_scan_bars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            min_scan_bars: crate::scanner::MIN_SCAN_BARS,
        }
    }
}
