// Trading strategy module
pub mod grid;
pub mod ladder;
pub mod reverse_ratio;
pub mod sizing;

pub use grid::GridStrategy;
pub use ladder::{Ladder, LadderPhase};
pub use reverse_ratio::ReverseRatioStrategy;
pub use sizing::{LevelAllocation, PositionSizer};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StrategyConfig;
use crate::models::{Candle, Position, Signal, StrategyBalance};
use crate::Result;

/// Candles considered for the recent high
pub const RECENT_HIGH_WINDOW: usize = 20;

/// Base trait for all grid strategies
///
/// One instance owns one ladder for one symbol and is driven from a single
/// task; run several instances for several bots.
pub trait Strategy: Send {
    /// Inspect the latest candles and price, emitting at most one signal
    fn analyze(&mut self, candles: &[Candle], current_price: f64) -> Option<Signal>;

    /// Base-asset size for a buy signal (0 = no trade)
    fn calculate_position_size(
        &self,
        balance: f64,
        signal: &Signal,
        current_price: f64,
        strategy_balance: &StrategyBalance,
    ) -> f64;

    /// Report a filled buy; `None` if the fill does not extend the ladder
    fn record_buy(&mut self, level: u32, price: f64, size: f64, time: i64) -> Option<Uuid>;

    /// Report a filled exit; returns the positions that were closed
    fn record_exit(&mut self) -> Vec<Position>;

    /// Get strategy name
    fn name(&self) -> &str;

    fn ladder(&self) -> &Ladder;

    fn calculate_average_entry_price(&self) -> f64 {
        self.ladder().average_entry_price()
    }

    fn calculate_profit_percent(&self, current_price: f64) -> f64 {
        self.ladder().profit_percent(current_price)
    }
}

/// Which concrete strategy to build from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    ReverseRatio,
    Grid,
}

impl std::str::FromStr for StrategyKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "reverse_ratio" => Ok(StrategyKind::ReverseRatio),
            "grid" => Ok(StrategyKind::Grid),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

pub fn build_strategy(
    kind: StrategyKind,
    symbol: &str,
    config: StrategyConfig,
) -> Result<Box<dyn Strategy>> {
    Ok(match kind {
        StrategyKind::ReverseRatio => Box::new(ReverseRatioStrategy::new(symbol, config)?),
        StrategyKind::Grid => Box::new(GridStrategy::new(symbol, config)?),
    })
}

/// Highest high over the last [`RECENT_HIGH_WINDOW`] candles, `current_price` without history
pub fn recent_high(candles: &[Candle], current_price: f64) -> f64 {
    let start = candles.len().saturating_sub(RECENT_HIGH_WINDOW);
    candles[start..]
        .iter()
        .map(|c| c.high)
        .reduce(f64::max)
        .unwrap_or(current_price)
}

/// Percent decline from `reference` to `price` (negative when above)
pub fn drop_percent(reference: f64, price: f64) -> f64 {
    if reference > 0.0 {
        (reference - price) / reference * 100.0
    } else {
        0.0
    }
}

/// Exit signal once the ladder's average entry is up by the profit target
///
/// Never fires at a loss, whatever the configured target.
pub(crate) fn profit_exit(
    ladder: &Ladder,
    config: &StrategyConfig,
    current_price: f64,
) -> Option<Signal> {
    if ladder.is_empty() {
        return None;
    }

    let profit = ladder.profit_percent(current_price);
    if profit > 0.0 && profit >= config.profit_target_percent {
        Some(Signal::sell(
            ladder.level(),
            current_price,
            format!(
                "profit {:.2}% >= target {:.2}% (avg entry ${:.2})",
                profit,
                config.profit_target_percent,
                ladder.average_entry_price()
            ),
        ))
    } else {
        None
    }
}

/// Warn when the configured ladder asks for more than the cap
pub(crate) fn log_allocation(name: &str, sizer: &PositionSizer, config: &StrategyConfig) {
    let total = sizer.total_potential_percent();
    if config.position_size_mode == crate::config::PositionSizeMode::Percentage
        && total > config.max_position_percent
    {
        tracing::warn!(
            "{}: ladder wants {:.1}% over {} levels, scaling every level by {:.4} to fit {:.1}%",
            name,
            total,
            config.max_levels,
            sizer.scale_factor(),
            config.max_position_percent
        );
    }
}
