use thiserror::Error;

/// Errors surfaced by the gridbot library
///
/// The numeric core (sizing, averaging, aggregation) never produces these for
/// degenerate numbers; it returns neutral values instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unsupported granularity: {0}s")]
    UnsupportedGranularity(u64),

    #[error("Invalid strategy config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle: {0}")]
    InvalidCandle(String),

    #[error("Not enough candles for backtest. Need {needed}, got {got}")]
    NotEnoughCandles { needed: usize, got: usize },

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
