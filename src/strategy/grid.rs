use uuid::Uuid;

use super::{
    drop_percent, log_allocation, profit_exit, recent_high, Ladder, PositionSizer, Strategy,
};
use crate::config::StrategyConfig;
use crate::models::{Candle, Position, Signal, StrategyBalance};
use crate::Result;

/// Fixed-spacing grid
///
/// Opens level 1 at `initial_drop_percent` below the rolling high, then adds
/// one level every `level_drop_percent` below the previous fill. Exits like
/// the reverse-ratio ladder: all levels at once, only in profit.
#[derive(Debug)]
pub struct GridStrategy {
    config: StrategyConfig,
    sizer: PositionSizer,
    ladder: Ladder,
    recent_high: Option<f64>,
}

impl GridStrategy {
    pub fn new(symbol: &str, config: StrategyConfig) -> Result<Self> {
        config.validate()?;
        let sizer = PositionSizer::new(&config);
        log_allocation("Grid", &sizer, &config);

        Ok(Self {
            ladder: Ladder::new(symbol, config.max_levels),
            sizer,
            config,
            recent_high: None,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Rolling high seen by the last `analyze` call
    pub fn recent_high(&self) -> Option<f64> {
        self.recent_high
    }
}

impl Strategy for GridStrategy {
    fn analyze(&mut self, candles: &[Candle], current_price: f64) -> Option<Signal> {
        if !(current_price > 0.0 && current_price.is_finite()) {
            tracing::warn!("Grid: ignoring price {}", current_price);
            return None;
        }

        let high = recent_high(candles, current_price);
        self.recent_high = Some(high);

        if let Some(signal) = profit_exit(&self.ladder, &self.config, current_price) {
            tracing::info!(
                "🎯 Grid SELL {} levels @ ${:.2}: {}",
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

        let (reference, required) = match self.ladder.last_entry_price() {
            Some(last_entry) => (last_entry, self.config.level_drop_percent),
            None => (high, self.config.initial_drop_percent),
        };
        let drop = drop_percent(reference, current_price);

        tracing::debug!(
            "🔍 Grid: price=${:.2} ref=${:.2} drop={:.2}% next L{} needs {:.2}%",
            current_price,
            reference,
            drop,
            next_level,
            required
        );

        (drop >= required).then(|| {
            Signal::buy(
                next_level,
                current_price,
                format!("{:.2}% below ${:.2}", drop, reference),
            )
        })
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
        tracing::info!(
            "💰 Grid BUY L{} {:.8} @ ${:.2} (avg ${:.2})",
            level,
            size,
            price,
            self.ladder.average_entry_price()
        );
        Some(id)
    }

    fn record_exit(&mut self) -> Vec<Position> {
        self.ladder.drain()
    }

    fn name(&self) -> &str {
        "Grid"
    }

    fn ladder(&self) -> &Ladder {
        &self.ladder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalType;
    use crate::strategy::test_support::candles_with_highs;

    fn strategy() -> GridStrategy {
        GridStrategy::new(
            "BTC-USD",
            StrategyConfig {
                initial_drop_percent: 4.0,
                level_drop_percent: 2.0,
                profit_target_percent: 2.0,
                max_levels: 4,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_first_level_from_recent_high() {
        let mut s = strategy();
        let candles = candles_with_highs(&[200.0; 10]);

        assert!(s.analyze(&candles, 193.0).is_none());
        let signal = s.analyze(&candles, 191.0).unwrap();
        assert_eq!(signal.level(), Some(1));
    }

    #[test]
    fn test_next_levels_spaced_from_last_fill() {
        let mut s = strategy();
        let candles = candles_with_highs(&[200.0; 10]);
        s.record_buy(1, 190.0, 1.0, 0).unwrap();

        // 2% below 190 = 186.2
        assert!(s.analyze(&candles, 187.0).is_none());
        assert_eq!(s.analyze(&candles, 186.0).unwrap().level(), Some(2));

        s.record_buy(2, 186.0, 1.0, 300).unwrap();
        // Spacing now measured from 186
        assert!(s.analyze(&candles, 183.0).is_none());
        assert_eq!(s.analyze(&candles, 182.0).unwrap().level(), Some(3));
    }

    #[test]
    fn test_exit_on_profit_target() {
        let mut s = strategy();
        s.record_buy(1, 100.0, 1.0, 0).unwrap();
        s.record_buy(2, 98.0, 1.0, 0).unwrap();

        // avg 99, +2% = 100.98
        assert!(s.analyze(&[], 100.9).is_none());
        let signal = s.analyze(&[], 101.0).unwrap();
        assert_eq!(signal.signal_type, SignalType::Sell);

        let closed = s.record_exit();
        assert_eq!(closed.len(), 2);
        assert!(s.ladder().is_empty());
        assert_eq!(s.calculate_profit_percent(150.0), 0.0);
    }

    #[test]
    fn test_rejects_skipped_level_fill() {
        let mut s = strategy();
        assert!(s.record_buy(2, 100.0, 1.0, 0).is_none());
        assert_eq!(s.ladder().level(), 0);
    }

    #[test]
    fn test_recent_high_tracked_while_leveling() {
        let mut s = strategy();
        assert_eq!(s.recent_high(), None);

        s.record_buy(1, 190.0, 1.0, 0).unwrap();
        s.analyze(&candles_with_highs(&[200.0; 10]), 189.0);
        assert_eq!(s.recent_high(), Some(200.0));

        s.analyze(&candles_with_highs(&[210.0; 10]), 189.0);
        assert_eq!(s.recent_high(), Some(210.0));
    }
}
