use uuid::Uuid;

use super::{
    drop_percent, log_allocation, profit_exit, recent_high, Ladder, PositionSizer, Strategy,
};
use crate::config::StrategyConfig;
use crate::models::{Candle, Position, Signal, StrategyBalance};
use crate::Result;

/// Reverse-ratio ladder
///
/// Buys deeper levels as price keeps falling from a reference high and sells
/// the whole ladder once the average entry is up by the profit target.
///
/// - Level 1 fires at `initial_drop_percent` below the rolling 20-candle high
/// - When level 1 fills, that high is anchored for the rest of the cycle
/// - Level n fires at `initial + (n-1) × level_drop_percent` below the anchor
/// - Size per level grows with `ratio_multiplier` (see [`PositionSizer`])
#[derive(Debug)]
pub struct ReverseRatioStrategy {
    config: StrategyConfig,
    sizer: PositionSizer,
    ladder: Ladder,
    recent_high: Option<f64>,
    anchor_high: Option<f64>,
}

impl ReverseRatioStrategy {
    pub fn new(symbol: &str, config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        let sizer = PositionSizer::new(&config);
        log_allocation("ReverseRatio", &sizer, &config);

        Ok(Self {
            ladder: Ladder::new(symbol, config.max_levels),
            sizer,
            config,
            recent_high: None,
            anchor_high: None,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    /// Rolling high seen by the last `analyze` call
    pub fn recent_high(&self) -> Option<f64> {
        self.recent_high
    }

    /// High the current cycle's drops are measured from
    pub fn reference_high(&self) -> Option<f64> {
        self.anchor_high.or(self.recent_high)
    }
}

impl Strategy for ReverseRatioStrategy {
    fn analyze(&mut self, candles: &[Candle], current_price: f64) -> Option<Signal> {
        if !(current_price > 0.0 && current_price.is_finite()) {
            tracing::warn!("ReverseRatio: ignoring price {}", current_price);
            return None;
        }

        let high = recent_high(candles, current_price);
        self.recent_high = Some(high);

        if let Some(signal) = profit_exit(&self.ladder, &self.config, current_price) {
            tracing::info!(
                "🎯 ReverseRatio SELL {} levels @ ${:.2}: {}",
                self.ladder.level(),
                current_price,
                signal.metadata.reason
            );
            return Some(signal);
        }

        let next_level = self.ladder.level() + 1;
        if next_level > self.config.max_levels {
            return None;
        }

        let reference = self.anchor_high.unwrap_or(high);
        let drop = drop_percent(reference, current_price);
        let required = self.config.required_drop_percent(next_level);

        tracing::debug!(
            "🔍 ReverseRatio: price=${:.2} ref=${:.2} drop={:.2}% next L{} needs {:.2}%",
            current_price,
            reference,
            drop,
            next_level,
            required
        );

        if drop >= required {
            Some(Signal::buy(
                next_level,
                current_price,
                format!(
                    "drop {:.2}% from ${:.2} >= {:.2}%",
                    drop, reference, required
                ),
            ))
        } else {
            None
        }
    }

    fn calculate_position_size(
        &self,
        balance: f64,
        signal: &Signal,
        current_price: f64,
        strategy_balance: &StrategyBalance,
    ) -> f64 {
        self.sizer
            .calculate_position_size(balance, signal, current_price, strategy_balance)
    }

    fn record_buy(&mut self, level: u32, price: f64, size: f64, time: i64) -> Option<Uuid> {
        let id = self.ladder.push(level, price, size, time)?;
        if level == 1 {
            self.anchor_high = Some(self.recent_high.unwrap_or(price));
        }
        tracing::info!(
            "💰 ReverseRatio BUY L{} {:.8} @ ${:.2} (avg ${:.2})",
            level,
            size,
            price,
            self.ladder.average_entry_price()
        );
        Some(id)
    }

    fn record_exit(&mut self) -> Vec<Position> {
        self.anchor_high = None;
        self.ladder.drain()
    }

    fn name(&self) -> &str {
        "ReverseRatio"
    }

    fn ladder(&self) -> &Ladder {
        &self.ladder
    }
}
