// Library crate - streaming candle scanner, market feed and backtester

pub mod backtest;
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod indicators;
pub mod observer;
pub mod orchestrator;
pub mod publish;
pub mod scanner;
pub mod shutdown;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{EngineConfig, FeedConfig};
pub use feed::MarketFeed;
pub use orchestrator::Orchestrator;
pub use publish::{format_signals, LogPublisher, Publisher};
pub use scanner::SignalScanner;
