// Candle ingestion: aggregation and sanity checks
pub mod aggregator;
pub mod validator;

pub use aggregator::{aggregate_series, CandleAggregator};
pub use validator::CandleValidator;
