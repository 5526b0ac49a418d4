use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backtest::BacktestSettings;
use crate::error::{Error, Result};
use crate::models::Granularity;
use crate::strategy::StrategyKind;

/// How a grid level's dollar amount is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSizeMode {
    /// Percent of available capital, scaled down if the full ladder would exceed the cap
    Percentage,
    /// Fixed quote amount per level times the level multiplier
    Fixed,
}

/// Upper bound on `max_levels`
pub const MAX_LEVELS_LIMIT: u32 = 1_000;

/// Per-strategy parameters. Percent values are whole numbers (6.0 means 6%).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Drop from the recent high that opens level 1
    pub initial_drop_percent: f64,
    /// Additional drop required for every level after the first
    pub level_drop_percent: f64,
    /// 1.0 = linear progression, anything else = geometric
    pub ratio_multiplier: f64,
    /// Unrealized profit on the average entry that closes the ladder
    pub profit_target_percent: f64,
    pub max_levels: u32,
    pub position_size_mode: PositionSizeMode,
    pub base_position_percent: f64,
    pub base_position_amount: f64,
    /// Cap on the sum of all level percentages
    pub max_position_percent: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            initial_drop_percent: 6.0,
            level_drop_percent: 3.0,
            ratio_multiplier: 1.0,
            profit_target_percent: 3.0,
            max_levels: 12,
            position_size_mode: PositionSizeMode::Percentage,
            base_position_percent: 8.0,
            base_position_amount: 100.0,
            max_position_percent: 96.0,
        }
    }
}

impl StrategyConfig {
    /// Cumulative drop (in percent) required before `level` may be bought
    pub fn required_drop_percent(&self, level: u32) -> f64 {
        let extra_levels = level.saturating_sub(1) as f64;
        self.initial_drop_percent + extra_levels * self.level_drop_percent
    }

    /// Reject values the engine cannot work with
    ///
    /// Over-allocation (`base_position_percent × ratio sum > max_position_percent`)
    /// is allowed; the sizer scales every level down proportionally.
    pub fn validate(&self) -> Result<()> {
        if self.max_levels == 0 {
            return Err(Error::InvalidConfig("max_levels must be at least 1".into()));
        }
        if self.max_levels > MAX_LEVELS_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_levels must be at most {}, got {}",
                MAX_LEVELS_LIMIT, self.max_levels
            )));
        }
        if !self.ratio_multiplier.is_finite() || self.ratio_multiplier <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "ratio_multiplier must be positive, got {}",
                self.ratio_multiplier
            )));
        }
        // The deepest level's multiplier must stay representable
        if !self
            .ratio_multiplier
            .powi(self.max_levels as i32)
            .is_finite()
        {
            return Err(Error::InvalidConfig(format!(
                "ratio_multiplier {} overflows over {} levels",
                self.ratio_multiplier, self.max_levels
            )));
        }
        if !(self.profit_target_percent > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "profit_target_percent must be positive, got {}",
                self.profit_target_percent
            )));
        }
        if !(self.initial_drop_percent >= 0.0) || !(self.level_drop_percent >= 0.0) {
            return Err(Error::InvalidConfig(
                "drop percentages must be zero or positive".into(),
            ));
        }
        if !(self.max_position_percent > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_position_percent must be positive, got {}",
                self.max_position_percent
            )));
        }
        match self.position_size_mode {
            PositionSizeMode::Percentage if !(self.base_position_percent > 0.0) => {
                Err(Error::InvalidConfig(format!(
                    "base_position_percent must be positive, got {}",
                    self.base_position_percent
                )))
            }
            PositionSizeMode::Fixed if !(self.base_position_amount > 0.0) => {
                Err(Error::InvalidConfig(format!(
                    "base_position_amount must be positive, got {}",
                    self.base_position_amount
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Top-level settings for the `gridbot` binary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub symbol: String,
    pub granularity: Granularity,
    pub strategy_kind: StrategyKind,
    pub strategy: StrategyConfig,
    pub backtest: BacktestSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USD".to_string(),
            granularity: Granularity::default(),
            strategy_kind: StrategyKind::default(),
            strategy: StrategyConfig::default(),
            backtest: BacktestSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from an optional file, then `GRIDBOT__*` environment variables
    ///
    /// Nested keys use a double underscore, e.g. `GRIDBOT__STRATEGY__MAX_LEVELS=8`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("GRIDBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.strategy.validate()?;

        tracing::debug!(
            "Loaded config: {} {} ({:?}, {} levels)",
            app.symbol,
            app.granularity,
            app.strategy_kind,
            app.strategy.max_levels
        );

        Ok(app)
    }
}
