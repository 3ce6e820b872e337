use thiserror::Error;

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Bad startup configuration (missing credential, no symbols). Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Scan window too short or indicator series out of step with the candles
    #[error(
        "invalid scan input: candles={candles} rsi={rsi} ema_fast={ema_fast} ema_slow={ema_slow}"
    )]
    InvalidInput {
        candles: usize,
        rsi: usize,
        ema_fast: usize,
        ema_slow: usize,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("export report: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
