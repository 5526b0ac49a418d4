use serde::Serialize;

use crate::config::{PositionSizeMode, StrategyConfig};
use crate::models::{Signal, SignalType, StrategyBalance};

/// Planned allocation for one grid level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAllocation {
    pub level: u32,
    pub multiplier: f64,
    /// Percent of capital after any scale-down (0 in fixed mode)
    pub percent: f64,
    pub dollars: f64,
    pub size: f64,
}

/// Translates buy signals into base-asset sizes across grid levels
///
/// `balance` passed to the sizing methods is the total capital the caller
/// makes available (free funds plus whatever reserved funds it chooses to
/// include). The sizer does not combine `StrategyBalance` fields itself.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    mode: PositionSizeMode,
    ratio_multiplier: f64,
    max_levels: u32,
    base_position_percent: f64,
    base_position_amount: f64,
    max_position_percent: f64,
}

impl PositionSizer {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            mode: config.position_size_mode,
            ratio_multiplier: config.ratio_multiplier,
            max_levels: config.max_levels,
            base_position_percent: config.base_position_percent,
            base_position_amount: config.base_position_amount,
            max_position_percent: config.max_position_percent,
        }
    }

    /// `level` when the multiplier is exactly 1, else `multiplier^(level-1)`
    pub fn level_multiplier(&self, level: u32) -> f64 {
        if self.is_linear() {
            level as f64
        } else {
            self.ratio_multiplier.powi(exponent(level.saturating_sub(1)))
        }
    }

    /// Sum of the multiplier series over `max_levels` terms
    pub fn ratio_sum(&self) -> f64 {
        let n = self.max_levels as f64;
        if self.is_linear() {
            n * (n + 1.0) / 2.0
        } else {
            let r = self.ratio_multiplier;
            (r.powi(exponent(self.max_levels)) - 1.0) / (r - 1.0)
        }
    }

    /// Percent of capital the full ladder would use before any scale-down
    pub fn total_potential_percent(&self) -> f64 {
        self.base_position_percent * self.ratio_sum()
    }

    /// Factor applied to every level percentage (1.0 when under the cap)
    pub fn scale_factor(&self) -> f64 {
        let total = self.total_potential_percent();
        if total > self.max_position_percent {
            self.max_position_percent / total
        } else {
            1.0
        }
    }

    /// Unscaled percentage for `level`
    pub fn level_percent(&self, level: u32) -> f64 {
        self.base_position_percent * self.level_multiplier(level)
    }

    /// Percentage for `level` after the proportional scale-down
    pub fn adjusted_level_percent(&self, level: u32) -> f64 {
        let level_percent = self.level_percent(level);
        let total = self.total_potential_percent();
        if total > self.max_position_percent {
            level_percent * (self.max_position_percent / total)
        } else {
            level_percent
        }
    }

    /// Quote amount to spend on `level`
    pub fn dollar_amount(&self, balance: f64, level: u32) -> f64 {
        match self.mode {
            PositionSizeMode::Percentage => balance * self.adjusted_level_percent(level) / 100.0,
            PositionSizeMode::Fixed => self.base_position_amount * self.level_multiplier(level),
        }
    }

    /// Base-asset size for a buy signal; 0 when no trade should happen
    pub fn calculate_position_size(
        &self,
        balance: f64,
        signal: &Signal,
        current_price: f64,
        strategy_balance: &StrategyBalance,
    ) -> f64 {
        if signal.signal_type != SignalType::Buy {
            return 0.0;
        }
        let Some(level) = signal.metadata.level else {
            tracing::debug!("Buy signal without level, sizing skipped");
            return 0.0;
        };
        if level == 0 || level > self.max_levels {
            tracing::debug!(
                "Level {} outside 1..={}, sizing skipped",
                level,
                self.max_levels
            );
            return 0.0;
        }
        if !(current_price > 0.0) {
            return 0.0;
        }

        let dollars = self.dollar_amount(balance, level);
        if !(dollars > 0.0) {
            return 0.0;
        }

        let size = dollars / current_price;

        tracing::debug!(
            "📐 Sized level {}: ${:.2} of ${:.2} (free ${:.2}, vault ${:.2}) -> {:.8} @ ${:.2}",
            level,
            dollars,
            balance,
            strategy_balance.usd,
            strategy_balance.vault,
            size,
            current_price
        );

        size
    }

    /// Allocation for every level 1..=max_levels
    pub fn ladder(&self, balance: f64, current_price: f64) -> Vec<LevelAllocation> {
        (1..=self.max_levels)
            .map(|level| {
                let dollars = self.dollar_amount(balance, level);
                let size = if current_price > 0.0 {
                    dollars / current_price
                } else {
                    0.0
                };
                LevelAllocation {
                    level,
                    multiplier: self.level_multiplier(level),
                    percent: match self.mode {
                        PositionSizeMode::Percentage => self.adjusted_level_percent(level),
                        PositionSizeMode::Fixed => 0.0,
                    },
                    dollars,
                    size,
                }
            })
            .collect()
    }

    // Exactly 1.0 selects the linear ladder
    #[allow(clippy::float_cmp)]
    fn is_linear(&self) -> bool {
        self.ratio_multiplier == 1.0
    }
}

// Levels are capped well below i32::MAX by config validation
fn exponent(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
