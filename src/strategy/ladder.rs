use serde::Serialize;
use uuid::Uuid;

use crate::models::Position;

/// Where a ladder sits in its buy/exit cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LadderPhase {
    /// No open positions, level 0
    Idle,
    /// 1 <= level < max_levels
    Leveling,
    /// level == max_levels, no further buys
    Maxed,
}

/// Open positions of one strategy instance plus its level counter
///
/// Only open positions are stored; an exit drains the whole collection.
#[derive(Debug, Clone)]
pub struct Ladder {
    symbol: String,
    max_levels: u32,
    level: u32,
    positions: Vec<Position>,
}

impl Ladder {
    pub fn new(symbol: impl Into<String>, max_levels: u32) -> Self {
        Self {
            symbol: symbol.into(),
            max_levels,
            level: 0,
            positions: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn max_levels(&self) -> u32 {
        self.max_levels
    }

    pub fn phase(&self) -> LadderPhase {
        if self.level == 0 {
            LadderPhase::Idle
        } else if self.level >= self.max_levels {
            LadderPhase::Maxed
        } else {
            LadderPhase::Leveling
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn open_positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn total_size(&self) -> f64 {
        self.positions.iter().map(|p| p.size).sum()
    }

    pub fn cost_basis(&self) -> f64 {
        self.positions.iter().map(Position::cost_basis).sum()
    }

    pub fn last_entry_price(&self) -> Option<f64> {
        self.positions.last().map(|p| p.entry_price)
    }

    pub fn first_entry_time(&self) -> Option<i64> {
        self.positions.first().map(|p| p.entry_time)
    }

    /// Size-weighted mean entry price, 0 with no open positions
    pub fn average_entry_price(&self) -> f64 {
        let total_size = self.total_size();
        if total_size > 0.0 {
            self.cost_basis() / total_size
        } else {
            0.0
        }
    }

    /// Unrealized profit of the whole ladder in percent, 0 with no entry price
    pub fn profit_percent(&self, current_price: f64) -> f64 {
        let average = self.average_entry_price();
        if average == 0.0 {
            return 0.0;
        }
        (current_price - average) / average * 100.0
    }

    /// Record a filled level
    ///
    /// Only the next level (current + 1, within max_levels) with a positive
    /// finite price and size is accepted; anything else is a no-op.
    pub fn push(
        &mut self,
        level: u32,
        entry_price: f64,
        size: f64,
        entry_time: i64,
    ) -> Option<Uuid> {
        if level != self.level + 1 || level > self.max_levels {
            tracing::debug!(
                "Ignoring fill for level {} on {} (current level {}, max {})",
                level,
                self.symbol,
                self.level,
                self.max_levels
            );
            return None;
        }
        if !(entry_price > 0.0 && entry_price.is_finite() && size > 0.0 && size.is_finite()) {
            tracing::debug!(
                "Ignoring fill for level {} on {}: price {} size {}",
                level,
                self.symbol,
                entry_price,
                size
            );
            return None;
        }

        let id = Uuid::new_v4();
        self.positions.push(Position {
            id,
            symbol: self.symbol.clone(),
            entry_price,
            size,
            level,
            entry_time,
        });
        self.level = level;

        Some(id)
    }

    /// Close everything and reset to level 0
    pub fn drain(&mut self) -> Vec<Position> {
        self.level = 0;
        std::mem::take(&mut self.positions)
    }
}
