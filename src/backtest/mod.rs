pub mod metrics;
pub mod runner;
pub mod synthetic;

pub use metrics::{BacktestMetrics, RunTotals, TradeRecord};
pub use runner::{BacktestRunner, BacktestSettings};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
